//! Tree node arena: leaves, adapters, and the scattering formulas that drive them.
//!
//! The tree is a flat [`Vec<TreeNode>`] arena indexed by [`NodeId`] rather than a graph of
//! owning pointers. Every node owns one "up" port (toward its parent, or toward the root for
//! a subtree entry) and zero or more "down" ports (toward its children), stored in the same
//! order as `children`. `down[i].a` always equals `children[i]`'s `up.b` and `children[i]`'s
//! `up.a` always equals `down[i].b`; the traversal functions in [`crate::tree`] are what keep
//! that invariant true at every sample.
use std::fmt;

use wdf_core::Matrix;

use crate::error::WdfError;
use crate::wave::Port;

/// Opaque handle into a tree's node arena. Only [`crate::builder::TreeBuilder`] creates these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A user-supplied multi-port adapter, the sole extension point for circuit topologies this
/// crate does not model directly (transformers, gyrators, coupled structures, ...).
///
/// Implementors receive the up resistances of their `n` children (in port order) and must
/// return their own up resistance, then the `(n+1) x (n+1)` scattering matrix `S` such that
/// `b = S * a` where `a = [d, a_1, ..., a_n]` (`d` is the wave arriving from the parent) and
/// `b = [upB, b_1, ..., b_n]`. Row/column `0` is the parent-facing port.
pub trait RTypeAdapter: fmt::Debug {
    /// Compute this node's own up resistance from its children's up resistances.
    fn up_resistance(&self, child_resistances: &[f64]) -> Result<f64, WdfError>;

    /// Compute the `(n+1) x (n+1)` scattering matrix given the children's up resistances and
    /// this node's own (already computed) up resistance.
    fn scatter_matrix(&self, child_resistances: &[f64], up_resistance: f64) -> Result<Matrix, WdfError>;
}

/// What kind of element a tree node is, plus whatever state/coefficients it carries between
/// adaptation and per-sample scattering.
pub enum NodeKind {
    /// Pure resistance, reflection-free (`upB = 0`).
    Resistor {
        /// Resistance in Ohm.
        r: f64,
    },
    /// Trapezoidal-discretized capacitor with one sample of memory.
    Capacitor {
        /// Capacitance in Farad.
        c: f64,
        /// Sample rate the element was last adapted at.
        fs: f64,
        /// Previous incident wave, read back as this sample's reflected wave.
        prev_a: f64,
    },
    /// Trapezoidal-discretized inductor with one sample of memory.
    Inductor {
        /// Inductance in Henry.
        l: f64,
        /// Sample rate the element was last adapted at.
        fs: f64,
        /// Previous incident wave (negated), read back as this sample's reflected wave.
        prev_a: f64,
    },
    /// Ideal voltage source `vs` in series with resistance `rser`.
    ResistiveVoltageSource {
        /// Source voltage.
        vs: f64,
        /// Series resistance, also this node's up resistance.
        rser: f64,
    },
    /// Ideal current source `is` in parallel with resistance `rpar`.
    ResistiveCurrentSource {
        /// Source current.
        is: f64,
        /// Parallel resistance, also this node's up resistance.
        rpar: f64,
    },
    /// Two-port series adapter; `children[0]` is the "left" and `children[1]` the "right" port.
    Series {
        /// Left scattering coefficient, recomputed on every `adapt()`.
        yl: f64,
        /// Right scattering coefficient, recomputed on every `adapt()`.
        yr: f64,
    },
    /// Two-port parallel adapter.
    Parallel {
        /// Left scattering coefficient, recomputed on every `adapt()`.
        dl: f64,
        /// Right scattering coefficient, recomputed on every `adapt()`.
        dr: f64,
    },
    /// Single-port sign inverter, used to reconcile reference directions.
    Inverter,
    /// User-supplied n-port adapter with its cached scattering matrix.
    RType {
        /// The adapter implementation.
        adapter: Box<dyn RTypeAdapter>,
        /// Cached `(n+1) x (n+1)` scattering matrix, recomputed on every `adapt()`.
        s: Matrix,
    },
}

/// Which scalar field of a [`NodeKind`] a host-facing parameter controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
    /// The element's primary value: `r` for a resistor, `c` for a capacitor, `l` for an
    /// inductor, `vs` for a resistive voltage source, `is` for a resistive current source.
    Value,
    /// `rser` on a resistive voltage source.
    SeriesResistance,
    /// `rpar` on a resistive current source.
    ParallelResistance,
}

impl NodeKind {
    /// Write `value` into the field named by `field`, erroring if this node kind has no such
    /// field.
    pub(crate) fn set_field(&mut self, field: NodeField, value: f64) -> Result<(), WdfError> {
        match (self, field) {
            (Self::Resistor { r }, NodeField::Value) => *r = value,
            (Self::Capacitor { c, .. }, NodeField::Value) => *c = value,
            (Self::Inductor { l, .. }, NodeField::Value) => *l = value,
            (Self::ResistiveVoltageSource { vs, .. }, NodeField::Value) => *vs = value,
            (Self::ResistiveVoltageSource { rser, .. }, NodeField::SeriesResistance) => *rser = value,
            (Self::ResistiveCurrentSource { is, .. }, NodeField::Value) => *is = value,
            (Self::ResistiveCurrentSource { rpar, .. }, NodeField::ParallelResistance) => *rpar = value,
            _ => {
                return Err(WdfError::configuration(format!(
                    "parameter field {field:?} does not apply to this node kind"
                )))
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resistor { r } => f.debug_struct("Resistor").field("r", r).finish(),
            Self::Capacitor { c, fs, .. } => {
                f.debug_struct("Capacitor").field("c", c).field("fs", fs).finish()
            }
            Self::Inductor { l, fs, .. } => {
                f.debug_struct("Inductor").field("l", l).field("fs", fs).finish()
            }
            Self::ResistiveVoltageSource { vs, rser } => f
                .debug_struct("ResistiveVoltageSource")
                .field("vs", vs)
                .field("rser", rser)
                .finish(),
            Self::ResistiveCurrentSource { is, rpar } => f
                .debug_struct("ResistiveCurrentSource")
                .field("is", is)
                .field("rpar", rpar)
                .finish(),
            Self::Series { yl, yr } => f.debug_struct("Series").field("yl", yl).field("yr", yr).finish(),
            Self::Parallel { dl, dr } => f.debug_struct("Parallel").field("dl", dl).field("dr", dr).finish(),
            Self::Inverter => f.write_str("Inverter"),
            Self::RType { adapter, .. } => f.debug_struct("RType").field("adapter", adapter).finish(),
        }
    }
}

/// One node in the tree arena: its element/adapter kind, its up port, and its down ports.
#[derive(Debug)]
pub struct TreeNode {
    pub(crate) kind: NodeKind,
    pub(crate) up: Port,
    pub(crate) down: Vec<Port>,
    pub(crate) children: Vec<NodeId>,
}

impl TreeNode {
    pub(crate) fn leaf(kind: NodeKind) -> Self {
        Self {
            kind,
            up: Port::default(),
            down: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn with_children(kind: NodeKind, children: Vec<NodeId>) -> Self {
        let down = vec![Port::default(); children.len()];
        Self {
            kind,
            up: Port::default(),
            down,
            children,
        }
    }
}

/// Compute a node's up-wave (`upB`, the value reflected toward its parent) from the incident
/// waves already sitting on its down ports (`down_a`, in child order). Pure function of state
/// that does not mutate anything; reactive leaves read their memory rather than `down_a`.
pub(crate) fn up_wave(kind: &NodeKind, down_a: &[f64]) -> f64 {
    match kind {
        NodeKind::Resistor { .. } => 0.0,
        NodeKind::Capacitor { prev_a, .. } => *prev_a,
        NodeKind::Inductor { prev_a, .. } => *prev_a,
        NodeKind::ResistiveVoltageSource { vs, .. } => *vs,
        NodeKind::ResistiveCurrentSource { is, rpar } => rpar * is,
        NodeKind::Series { .. } => -(down_a[0] + down_a[1]),
        NodeKind::Parallel { dl, dr } => dl * down_a[0] + dr * down_a[1],
        NodeKind::Inverter => -down_a[0],
        NodeKind::RType { s, .. } => {
            let n = down_a.len();
            let mut acc = 0.0;
            for i in 0..n {
                acc += s[(0, i + 1)] * down_a[i];
            }
            acc
        }
    }
}

/// Compute a node's down-waves given the incident wave from its parent (`d`) and the incident
/// waves already sitting on its down ports (`down_a`). Leaves return an empty vector but update
/// their memory in place; adapters return one value per child, in child order.
pub(crate) fn down_waves(kind: &mut NodeKind, down_a: &[f64], d: f64) -> Vec<f64> {
    match kind {
        NodeKind::Resistor { .. }
        | NodeKind::ResistiveVoltageSource { .. }
        | NodeKind::ResistiveCurrentSource { .. } => Vec::new(),
        NodeKind::Capacitor { prev_a, .. } => {
            *prev_a = d;
            Vec::new()
        }
        NodeKind::Inductor { prev_a, .. } => {
            *prev_a = -d;
            Vec::new()
        }
        NodeKind::Series { yl, yr } => {
            let (al, ar) = (down_a[0], down_a[1]);
            let bl = al - *yl * (al + ar + d);
            let br = ar - *yr * (al + ar + d);
            vec![bl, br]
        }
        NodeKind::Parallel { dl, dr } => {
            let (al, ar) = (down_a[0], down_a[1]);
            let bl = (*dl - 1.0) * al + *dr * ar + d;
            let br = *dl * al + (*dr - 1.0) * ar + d;
            vec![bl, br]
        }
        NodeKind::Inverter => vec![-d],
        NodeKind::RType { s, .. } => {
            let n = down_a.len();
            (0..n)
                .map(|i| {
                    let mut acc = s[(i + 1, 0)] * d;
                    for (j, &a) in down_a.iter().enumerate() {
                        acc += s[(i + 1, j + 1)] * a;
                    }
                    acc
                })
                .collect()
        }
    }
}
