//! Root variants that close a tree: simple one-port terminations, linear multi-port R-type
//! terminations, and the non-linear Newton-Raphson-backed termination.
use std::fmt;

use wdf_core::{Matrix, NewtonSolver, RootEq, Vector};

use crate::error::WdfError;
use crate::models::DeviceModel;

/// A one-port element that terminates a single subtree directly, with no further children.
/// Grounded in the teacher's `unadapted` one-ports, extended with reactive and resistive
/// variants the teacher does not need (it only ever closes trees with sources and switches).
#[derive(Debug, Clone)]
pub enum SimpleRoot {
    /// Zero voltage regardless of current.
    ShortCircuit,
    /// Zero current regardless of voltage.
    OpenCircuit,
    /// Ideal (zero series resistance) voltage source.
    IdealVoltageSource {
        /// Source voltage.
        vs: f64,
    },
    /// Ideal (infinite parallel resistance) current source.
    IdealCurrentSource {
        /// Source current.
        is: f64,
    },
    /// A two-state switch, open or closed.
    Switch {
        /// Whether the switch is currently closed (conducting).
        closed: bool,
    },
    /// Resistive termination.
    Resistor {
        /// Resistance in Ohm.
        r: f64,
    },
    /// Capacitive termination, unadapted: two samples of memory plus a reflection coefficient
    /// cached at `adapt` time from the subtree's port resistance.
    Capacitor {
        /// Capacitance in Farad.
        c: f64,
        /// Sample rate last adapted at.
        fs: f64,
        /// Reflection coefficient `(Rp - 1/(2*fs*C)) / (Rp + 1/(2*fs*C))`, cached at `adapt`.
        rho: f64,
        /// Previous incident wave.
        prev_a: f64,
        /// Previous reflected wave.
        prev_b: f64,
    },
    /// Inductive termination, unadapted: two samples of memory plus a reflection coefficient
    /// cached at `adapt` time from the subtree's port resistance.
    Inductor {
        /// Inductance in Henry.
        l: f64,
        /// Sample rate last adapted at.
        fs: f64,
        /// Reflection coefficient `(Rp - 2*fs*L) / (Rp + 2*fs*L)`, cached at `adapt`.
        rho: f64,
        /// Previous incident wave.
        prev_a: f64,
        /// Previous reflected wave.
        prev_b: f64,
    },
}

impl SimpleRoot {
    /// Reflect the incident wave `a`, given the port resistance `rp` of the subtree it
    /// terminates. Unlike a leaf, a simple root is *unadapted*: `rp` is whatever the subtree
    /// below hands up, generally not equal to the root's own component value, so every
    /// resistive/reactive variant's reflection is driven by a coefficient `rho` derived from
    /// both.
    pub(crate) fn reflect(&mut self, a: f64, rp: f64) -> f64 {
        match self {
            Self::ShortCircuit => -a,
            Self::OpenCircuit => a,
            Self::IdealVoltageSource { vs } => 2.0 * *vs - a,
            Self::IdealCurrentSource { is } => 2.0 * rp * *is - a,
            Self::Switch { closed } => {
                if *closed {
                    -a
                } else {
                    a
                }
            }
            Self::Resistor { r } => {
                let rho = (*r - rp) / (*r + rp);
                rho * a
            }
            Self::Capacitor { rho, prev_a, prev_b, .. } => {
                let b = *rho * *prev_b - *rho * a + *prev_a;
                *prev_a = a;
                *prev_b = b;
                b
            }
            Self::Inductor { rho, prev_a, prev_b, .. } => {
                let b = -*rho * *prev_b - *rho * a - *prev_a;
                *prev_a = a;
                *prev_b = b;
                b
            }
        }
    }

    /// Validate the root's own component value, record the sample rate it was adapted at, and
    /// (for the reactive variants) cache the reflection coefficient `rho` implied by the
    /// subtree's port resistance `rp`.
    pub(crate) fn validate_and_sync(&mut self, fs: f64, rp: f64) -> Result<(), WdfError> {
        match self {
            Self::Resistor { r } if *r <= 0.0 => {
                Err(WdfError::configuration(format!("root resistance must be positive, got {r}")))
            }
            Self::Capacitor { c, fs: node_fs, rho, .. } => {
                if *c <= 0.0 {
                    return Err(WdfError::configuration(format!("root capacitance must be positive, got {c}")));
                }
                *node_fs = fs;
                let r_eq = 1.0 / (2.0 * fs * *c);
                *rho = (rp - r_eq) / (rp + r_eq);
                Ok(())
            }
            Self::Inductor { l, fs: node_fs, rho, .. } => {
                if *l <= 0.0 {
                    return Err(WdfError::configuration(format!("root inductance must be positive, got {l}")));
                }
                *node_fs = fs;
                let r_eq = 2.0 * fs * *l;
                *rho = (rp - r_eq) / (rp + r_eq);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Write `value` into the field named by `field`, erroring if this variant has no such
    /// field.
    pub(crate) fn set_field(&mut self, field: RootField, value: f64) -> Result<(), WdfError> {
        match (self, field) {
            (Self::Resistor { r }, RootField::Value) => *r = value,
            (Self::Capacitor { c, .. }, RootField::Value) => *c = value,
            (Self::Inductor { l, .. }, RootField::Value) => *l = value,
            (Self::IdealVoltageSource { vs }, RootField::Value) => *vs = value,
            (Self::IdealCurrentSource { is }, RootField::Value) => *is = value,
            (Self::Switch { closed }, RootField::SwitchClosed) => *closed = value != 0.0,
            _ => {
                return Err(WdfError::configuration(format!(
                    "parameter field {field:?} does not apply to this root variant"
                )))
            }
        }
        Ok(())
    }
}

/// Which scalar field of a [`SimpleRoot`] a host-facing parameter controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootField {
    /// The element's primary value: `r`, `c`, `l`, `vs`, or `is`, matching whichever variant the
    /// root actually is.
    Value,
    /// Whether a [`SimpleRoot::Switch`] is closed. Non-zero is closed.
    SwitchClosed,
}

/// User-supplied linear multi-port termination, the root analogue of
/// [`crate::node::RTypeAdapter`]: no up port, so only an `n x n` scattering matrix is needed.
pub trait RootMatrixSource: fmt::Debug {
    /// Compute the `n x n` scattering matrix given the up resistances of the `n` subtrees this
    /// root terminates, in subtree-entry order.
    fn scatter_matrix(&self, subtree_resistances: &[f64]) -> Result<Matrix, WdfError>;
}

/// Evaluate every device's current contribution at `x`, concatenated in catalog order.
fn device_currents(devices: &[Box<dyn DeviceModel>], x: &Vector) -> Vector {
    let mut f = Vector::zeros(x.len());
    let mut offset = 0;
    for device in devices {
        let n = device.port_count();
        let slice: Vec<f64> = (0..n).map(|i| x[offset + i]).collect();
        let currents = device.currents(&slice);
        for i in 0..n {
            f[offset + i] = currents[i];
        }
        offset += n;
    }
    f
}

/// Evaluate the block-diagonal Jacobian of [`device_currents`] at `x`.
fn device_jacobian(devices: &[Box<dyn DeviceModel>], x: &Vector) -> Matrix {
    let n = x.len();
    let mut j = Matrix::zeros(n, n);
    let mut offset = 0;
    for device in devices {
        let k = device.port_count();
        let slice: Vec<f64> = (0..k).map(|i| x[offset + i]).collect();
        let block = device.jacobian(&slice);
        for r in 0..k {
            for c in 0..k {
                j[(offset + r, offset + c)] = block[(r, c)];
            }
        }
        offset += k;
    }
    j
}

/// Bridges a catalog of [`DeviceModel`]s against the non-linear root equation
/// `F(x) = E*a + Fmat*f(x) - x = 0`, where `x` is the vector of port voltages at the devices and
/// `a` is the vector of ascending waves from the linear subtrees.
pub(crate) struct NonLinearEquation<'a> {
    pub(crate) e: &'a Matrix,
    pub(crate) f_mat: &'a Matrix,
    pub(crate) ascending: &'a Vector,
    pub(crate) devices: &'a [Box<dyn DeviceModel>],
}

impl<'a> RootEq for NonLinearEquation<'a> {
    fn eval(&self, x: &Vector) -> Vector {
        let f = device_currents(self.devices, x);
        self.e * self.ascending + self.f_mat * f - x
    }

    fn jacobian(&self, x: &Vector) -> Option<Matrix> {
        let jf = device_jacobian(self.devices, x);
        let n = x.len();
        Some(self.f_mat * jf - Matrix::identity(n, n))
    }
}

/// Supplies the non-linear root's `E`, `Fmat`, `M`, `N` matrices, the linear part of the
/// one-port network surrounding the device bank. Re-derived on every `adapt()` from the
/// terminated subtrees' up resistances, the same way [`RootMatrixSource`] re-derives an R-type
/// root's scattering matrix: both are the "linear network as a function of port resistances"
/// half of the adaptation contract, just sized for the implicit equation instead of a direct
/// scattering matrix.
pub trait NlMatrixSource: fmt::Debug {
    /// Compute `(E, Fmat, M, N)` given the up resistances of the `n` linear subtrees (in
    /// subtree-entry order) and the total number of device ports `k`. Shapes: `E` is `k x n`,
    /// `Fmat` is `k x k`, `M` is `n x n`, `N` is `n x k`.
    fn matrices(&self, subtree_resistances: &[f64], device_port_count: usize) -> Result<(Matrix, Matrix, Matrix, Matrix), WdfError>;
}

/// Closes a tree with a bank of non-linear devices via Newton-Raphson, warm-started from the
/// previous sample's solution.
pub struct NonLinearRoot {
    pub(crate) devices: Vec<Box<dyn DeviceModel>>,
    pub(crate) source: Box<dyn NlMatrixSource>,
    pub(crate) e: Matrix,
    pub(crate) f_mat: Matrix,
    pub(crate) m: Matrix,
    pub(crate) n: Matrix,
    pub(crate) solver: NewtonSolver,
    pub(crate) x_prev: Vector,
    pub(crate) last_converged: bool,
    pub(crate) last_iterations: usize,
}

impl NonLinearRoot {
    pub(crate) fn device_port_count(&self) -> usize {
        self.devices.iter().map(|d| d.port_count()).sum()
    }

    pub(crate) fn re_adapt(&mut self, subtree_resistances: &[f64]) -> Result<(), WdfError> {
        let (e, f_mat, m, n) = self.source.matrices(subtree_resistances, self.device_port_count())?;
        self.e = e;
        self.f_mat = f_mat;
        self.m = m;
        self.n = n;
        // the linear network around the devices just changed, so the previous operating point is
        // no longer a meaningful warm start; fall back to the zero vector for the next scatter.
        self.x_prev = Vector::zeros(self.x_prev.len());
        Ok(())
    }

    pub(crate) fn scatter(&mut self, ascending: &Vector) -> Vector {
        let warm_start_currents = device_currents(&self.devices, &self.x_prev);
        let initial_guess = &self.f_mat * warm_start_currents + &self.e * ascending;
        let equation = NonLinearEquation {
            e: &self.e,
            f_mat: &self.f_mat,
            ascending,
            devices: &self.devices,
        };
        let result = self.solver.solve(&equation, initial_guess);
        self.last_converged = result.converged;
        self.last_iterations = result.iterations;
        if !result.converged {
            log::warn!(
                "non-linear root failed to converge after {} iterations",
                result.iterations
            );
        }
        self.x_prev = result.x.clone();
        let f = device_currents(&self.devices, &result.x);
        &self.m * ascending + &self.n * f
    }
}

impl fmt::Debug for NonLinearRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonLinearRoot")
            .field("devices", &self.devices.len())
            .field("last_converged", &self.last_converged)
            .field("last_iterations", &self.last_iterations)
            .finish()
    }
}

/// A tree's root: what closes the last free port(s) after all subtrees have scattered.
#[derive(Debug)]
pub enum Root {
    /// A single one-port termination.
    Simple(SimpleRoot),
    /// A linear multi-port termination, fully adapted (reflection-free is not required: the
    /// root has no parent to be reflection-free towards).
    RType {
        /// The user-supplied matrix source.
        source: Box<dyn RootMatrixSource>,
        /// Cached scattering matrix, recomputed on every `adapt()`.
        s: Matrix,
    },
    /// A non-linear termination closed by Newton-Raphson.
    NonLinear(NonLinearRoot),
}

impl Root {
    pub(crate) fn arity(&self) -> usize {
        match self {
            Self::Simple(_) => 1,
            Self::RType { s, .. } => s.nrows(),
            Self::NonLinear(root) => root.m.nrows(),
        }
    }

    /// Write `value` into the field named by `field` on this root's [`SimpleRoot`], erroring if
    /// the root is not a simple one-port termination.
    pub(crate) fn set_field(&mut self, field: RootField, value: f64) -> Result<(), WdfError> {
        match self {
            Self::Simple(root) => root.set_field(field, value),
            _ => Err(WdfError::configuration(
                "parameter field binding only applies to a simple one-port root",
            )),
        }
    }

    /// Terminate a subtree with a short circuit (zero volts).
    pub fn short_circuit() -> Self {
        Self::Simple(SimpleRoot::ShortCircuit)
    }

    /// Terminate a subtree with an open circuit (zero current).
    pub fn open_circuit() -> Self {
        Self::Simple(SimpleRoot::OpenCircuit)
    }

    /// Terminate a subtree with an ideal (zero series resistance) voltage source.
    pub fn ideal_voltage_source(vs: f64) -> Self {
        Self::Simple(SimpleRoot::IdealVoltageSource { vs })
    }

    /// Terminate a subtree with an ideal (infinite parallel resistance) current source.
    pub fn ideal_current_source(is: f64) -> Self {
        Self::Simple(SimpleRoot::IdealCurrentSource { is })
    }

    /// Terminate a subtree with a two-state switch.
    pub fn switch(closed: bool) -> Self {
        Self::Simple(SimpleRoot::Switch { closed })
    }

    /// Terminate a subtree with a resistive load. Unlike a resistor leaf (always reflection-free
    /// since it's adapted), a root resistor is unadapted and reflects `rho * a`.
    pub fn resistor(r: f64) -> Self {
        Self::Simple(SimpleRoot::Resistor { r })
    }

    /// Terminate a subtree with a capacitive load.
    pub fn capacitor(c: f64) -> Self {
        Self::Simple(SimpleRoot::Capacitor {
            c,
            fs: 0.0,
            rho: 0.0,
            prev_a: 0.0,
            prev_b: 0.0,
        })
    }

    /// Terminate a subtree with an inductive load.
    pub fn inductor(l: f64) -> Self {
        Self::Simple(SimpleRoot::Inductor {
            l,
            fs: 0.0,
            rho: 0.0,
            prev_a: 0.0,
            prev_b: 0.0,
        })
    }

    /// Close `n` subtrees with a user-supplied linear R-type matrix.
    pub fn r_type(source: Box<dyn RootMatrixSource>, ports: usize) -> Self {
        Self::RType {
            source,
            s: Matrix::zeros(ports, ports),
        }
    }

    /// Close `n` subtrees with a bank of non-linear devices solved via Newton-Raphson.
    pub fn non_linear(devices: Vec<Box<dyn DeviceModel>>, source: Box<dyn NlMatrixSource>, linear_ports: usize) -> Self {
        let device_ports: usize = devices.iter().map(|d| d.port_count()).sum();
        Self::NonLinear(NonLinearRoot {
            devices,
            source,
            e: Matrix::zeros(device_ports, linear_ports),
            f_mat: Matrix::zeros(device_ports, device_ports),
            m: Matrix::zeros(linear_ports, linear_ports),
            n: Matrix::zeros(linear_ports, device_ports),
            solver: NewtonSolver::default(),
            x_prev: Vector::zeros(device_ports),
            last_converged: true,
            last_iterations: 0,
        })
    }
}
