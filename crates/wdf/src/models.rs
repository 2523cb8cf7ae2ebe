//! Nonlinear device models.
//!
//! Every model here is stateless: it reads a contiguous slice of the global solver state `x`
//! (voltages at its own ports) and contributes a current vector `f(x)` and the corresponding
//! block of the Jacobian `df/dx`, both sized to the device's own port count. The non-linear
//! root ([`crate::root::NonLinearRoot`]) is the only caller; it assembles these blocks into the
//! global residual and Jacobian used by the Newton solver.
//!
//! A Newton iterate can transiently overshoot into a region where the exponential term would
//! overflow `f64` long before any physically plausible operating point. Every model here
//! guards against that by extrapolating the exponential linearly (matching its value and slope
//! at the clamp point) past `EXP_ARG_CLAMP`, rather than flattening it outright the way a hard
//! value clamp would: a hard clamp would zero out the derivative and distort the curve well
//! inside the normal conduction region for real device parameters, not just in the overshoot
//! case it's meant to guard against (see `pedaler_core`'s BJT model for the same guard, applied
//! to its own exponent range).
use wdf_core::{Matrix, Vector};

/// Thermal voltage at room temperature (26 degrees C), in volts.
pub const THERMAL_VOLTAGE: f64 = 0.02585;

/// Clamp on the exponent argument `v / (n*Vt)` itself, not on `v`: `exp(80)` is still far from
/// `f64::MAX`, while `80 * n * Vt` is well past any physically meaningful forward bias, so normal
/// operation never touches this guard.
const EXP_ARG_CLAMP: f64 = 80.0;

/// A stateless nonlinear device occupying a contiguous slice of the solver's port-voltage
/// vector.
pub trait DeviceModel: std::fmt::Debug {
    /// Number of ports (and therefore the width of the state slice and Jacobian block) this
    /// device occupies.
    fn port_count(&self) -> usize;

    /// Evaluate the port current vector given this device's slice of port voltages.
    fn currents(&self, v: &[f64]) -> Vector;

    /// Evaluate `d(currents)/d(v)`, a `port_count x port_count` matrix.
    fn jacobian(&self, v: &[f64]) -> Matrix;
}

/// `exp(v / vt)`, linearly extrapolated past `EXP_ARG_CLAMP`.
fn safe_exp(v: f64, vt: f64) -> f64 {
    let arg = v / vt;
    if arg <= EXP_ARG_CLAMP {
        arg.exp()
    } else {
        EXP_ARG_CLAMP.exp() * (1.0 + (arg - EXP_ARG_CLAMP))
    }
}

/// `d(safe_exp(v, vt)) / dv`.
fn safe_exp_derivative(v: f64, vt: f64) -> f64 {
    let arg = v / vt;
    let slope = if arg <= EXP_ARG_CLAMP { arg.exp() } else { EXP_ARG_CLAMP.exp() };
    slope / vt
}

/// Numerically stable logistic sigmoid, computed piecewise so the exponential argument never
/// has the opposite sign of what keeps it bounded.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `log(1 + exp(c*x)) / c`, the softplus used by the Dempwolf triode's grid and plate branches,
/// linearly extrapolated past `EXP_ARG_CLAMP` matching value and slope at the clamp point.
fn softplus(x: f64, c: f64) -> f64 {
    let arg = c * x;
    if arg <= EXP_ARG_CLAMP {
        (1.0 + arg.exp()).ln() / c
    } else {
        let x0 = EXP_ARG_CLAMP / c;
        let value0 = (1.0 + EXP_ARG_CLAMP.exp()).ln() / c;
        value0 + sigmoid(EXP_ARG_CLAMP) * (x - x0)
    }
}

/// `d(softplus(x, c)) / dx`, consistent with `softplus`'s linear extrapolation past the clamp.
fn softplus_derivative(x: f64, c: f64) -> f64 {
    let arg = c * x;
    if arg <= EXP_ARG_CLAMP {
        sigmoid(arg)
    } else {
        sigmoid(EXP_ARG_CLAMP)
    }
}

/// Single diode, Shockley equation: `i = Is * (exp(v / (n*Vt)) - 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Diode {
    /// Saturation current, in Ampere.
    pub saturation_current: f64,
    /// Ideality factor (typically 1 to 2).
    pub ideality: f64,
}

impl Diode {
    /// Construct a diode model with the given saturation current and ideality factor.
    pub fn new(saturation_current: f64, ideality: f64) -> Self {
        Self {
            saturation_current,
            ideality,
        }
    }
}

impl DeviceModel for Diode {
    fn port_count(&self) -> usize {
        1
    }

    fn currents(&self, v: &[f64]) -> Vector {
        let vt = self.ideality * THERMAL_VOLTAGE;
        let i = self.saturation_current * (safe_exp(v[0], vt) - 1.0);
        Vector::from_element(1, i)
    }

    fn jacobian(&self, v: &[f64]) -> Matrix {
        let vt = self.ideality * THERMAL_VOLTAGE;
        let di = self.saturation_current * safe_exp_derivative(v[0], vt);
        Matrix::from_element(1, 1, di)
    }
}

/// Two diodes in anti-parallel, a common clipping-stage topology:
/// `i = Is * (exp(v / (n*Vt)) - exp(-v / (n*Vt)))`.
#[derive(Debug, Clone, Copy)]
pub struct AntiparallelDiodes {
    /// Saturation current shared by both diodes, in Ampere.
    pub saturation_current: f64,
    /// Ideality factor shared by both diodes.
    pub ideality: f64,
}

impl AntiparallelDiodes {
    /// Construct an anti-parallel diode pair model.
    pub fn new(saturation_current: f64, ideality: f64) -> Self {
        Self {
            saturation_current,
            ideality,
        }
    }
}

impl DeviceModel for AntiparallelDiodes {
    fn port_count(&self) -> usize {
        1
    }

    fn currents(&self, v: &[f64]) -> Vector {
        let vt = self.ideality * THERMAL_VOLTAGE;
        let i = self.saturation_current * (safe_exp(v[0], vt) - safe_exp(-v[0], vt));
        Vector::from_element(1, i)
    }

    fn jacobian(&self, v: &[f64]) -> Matrix {
        let vt = self.ideality * THERMAL_VOLTAGE;
        let di = self.saturation_current * (safe_exp_derivative(v[0], vt) + safe_exp_derivative(-v[0], vt));
        Matrix::from_element(1, 1, di)
    }
}

/// NPN bipolar transistor, Ebers-Moll injection-version equations. Ports are fixed to
/// `[v_bc, v_be]` (base-collector, base-emitter voltages); currents returned are the NL-port
/// currents `[i_bc, i_be]` in the same order, not terminal currents.
#[derive(Debug, Clone, Copy)]
pub struct NpnEbersMoll {
    /// Saturation current, in Ampere.
    pub saturation_current: f64,
    /// Forward current gain.
    pub beta_forward: f64,
    /// Reverse current gain.
    pub beta_reverse: f64,
}

impl NpnEbersMoll {
    /// Construct an NPN Ebers-Moll model from datasheet-style parameters.
    pub fn new(saturation_current: f64, beta_forward: f64, beta_reverse: f64) -> Self {
        Self {
            saturation_current,
            beta_forward,
            beta_reverse,
        }
    }

    fn alpha_forward(&self) -> f64 {
        self.beta_forward / (1.0 + self.beta_forward)
    }

    fn alpha_reverse(&self) -> f64 {
        self.beta_reverse / (1.0 + self.beta_reverse)
    }
}

impl DeviceModel for NpnEbersMoll {
    fn port_count(&self) -> usize {
        2
    }

    fn currents(&self, v: &[f64]) -> Vector {
        let (vbc, vbe) = (v[0], v[1]);
        let vt = THERMAL_VOLTAGE;
        let is = self.saturation_current;
        let (af, ar) = (self.alpha_forward(), self.alpha_reverse());
        let i_f = safe_exp(vbe, vt) - 1.0;
        let i_r = safe_exp(vbc, vt) - 1.0;
        let i_bc = -is * i_f + (is / ar) * i_r;
        let i_be = (is / af) * i_f - is * i_r;
        Vector::from_row_slice(&[i_bc, i_be])
    }

    fn jacobian(&self, v: &[f64]) -> Matrix {
        let (vbc, vbe) = (v[0], v[1]);
        let vt = THERMAL_VOLTAGE;
        let is = self.saturation_current;
        let (af, ar) = (self.alpha_forward(), self.alpha_reverse());
        let di_f_dvbe = safe_exp_derivative(vbe, vt);
        let di_r_dvbc = safe_exp_derivative(vbc, vt);
        // rows: [d(i_bc)/dvbc, d(i_bc)/dvbe; d(i_be)/dvbc, d(i_be)/dvbe]
        Matrix::from_row_slice(
            2,
            2,
            &[
                (is / ar) * di_r_dvbc,
                -is * di_f_dvbe,
                -is * di_r_dvbc,
                (is / af) * di_f_dvbe,
            ],
        )
    }
}

/// Dempwolf-style triode model: grid and plate currents are both a gain-scaled power of a
/// soft-plus "equivalent diode" voltage, the plate branch additionally folding in the grid's
/// amplification through `mu` and subtracting the grid current it already accounted for. Ports
/// are fixed to `[v_gk, v_pk]` (grid-cathode, plate-cathode voltages); currents returned are
/// `[i_g, i_p]` in the same order.
#[derive(Debug, Clone, Copy)]
pub struct DempwolfTriode {
    /// Amplification factor (mu).
    pub mu: f64,
    /// Plate branch gain (Gp).
    pub g_p: f64,
    /// Plate branch soft-plus sharpness (C).
    pub c_p: f64,
    /// Plate branch exponent (y), typically close to 1.5.
    pub ex_p: f64,
    /// Grid branch gain (Gg).
    pub g_g: f64,
    /// Grid branch soft-plus sharpness (Cg).
    pub c_g: f64,
    /// Grid branch exponent (E), typically close to 1.5.
    pub ex_g: f64,
    /// Grid current offset (Ig0).
    pub ig0: f64,
}

impl DempwolfTriode {
    /// Construct a triode model from its characteristic-curve fit parameters.
    pub fn new(mu: f64, g_p: f64, c_p: f64, ex_p: f64, g_g: f64, c_g: f64, ex_g: f64, ig0: f64) -> Self {
        Self {
            mu,
            g_p,
            c_p,
            ex_p,
            g_g,
            c_g,
            ex_g,
            ig0,
        }
    }
}

impl DeviceModel for DempwolfTriode {
    fn port_count(&self) -> usize {
        2
    }

    fn currents(&self, v: &[f64]) -> Vector {
        let (vgk, vpk) = (v[0], v[1]);
        let grid_sp = softplus(vgk, self.c_g);
        let ig = self.g_g * grid_sp.powf(self.ex_g) + self.ig0;

        let plate_arg = vpk / self.mu + vgk;
        let plate_sp = softplus(plate_arg, self.c_p);
        let ip = self.g_p * plate_sp.powf(self.ex_p) - ig;

        Vector::from_row_slice(&[ig, ip])
    }

    fn jacobian(&self, v: &[f64]) -> Matrix {
        let (vgk, vpk) = (v[0], v[1]);

        let grid_sp = softplus(vgk, self.c_g);
        let dgrid_sp_dvgk = softplus_derivative(vgk, self.c_g);
        let dig_dvgk = self.g_g * self.ex_g * grid_sp.powf(self.ex_g - 1.0) * dgrid_sp_dvgk;

        let plate_arg = vpk / self.mu + vgk;
        let plate_sp = softplus(plate_arg, self.c_p);
        let dplate_sp_darg = softplus_derivative(plate_arg, self.c_p);
        let dplate_term = self.g_p * self.ex_p * plate_sp.powf(self.ex_p - 1.0) * dplate_sp_darg;

        let dip_dvgk = dplate_term - dig_dvgk;
        let dip_dvpk = dplate_term / self.mu;

        // rows: [d(ig)/dvgk, d(ig)/dvpk; d(ip)/dvgk, d(ip)/dvpk]
        Matrix::from_row_slice(2, 2, &[dig_dvgk, 0.0, dip_dvgk, dip_dvpk])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diode_is_passive_at_zero_bias() {
        let d = Diode::new(1e-12, 1.5);
        let i = d.currents(&[0.0]);
        assert_relative_eq!(i[0], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn diode_jacobian_matches_finite_difference() {
        let d = Diode::new(1e-12, 1.5);
        let v = 0.3;
        let h = 1e-6;
        let i0 = d.currents(&[v])[0];
        let i1 = d.currents(&[v + h])[0];
        let numeric = (i1 - i0) / h;
        let analytic = d.jacobian(&[v])[(0, 0)];
        assert_relative_eq!(numeric, analytic, max_relative = 1e-3);
    }

    #[test]
    fn antiparallel_diodes_are_odd_symmetric() {
        let d = AntiparallelDiodes::new(1e-12, 1.5);
        let pos = d.currents(&[0.4])[0];
        let neg = d.currents(&[-0.4])[0];
        assert_relative_eq!(pos, -neg, epsilon = 1e-15);
    }

    #[test]
    fn npn_off_state_has_negligible_currents() {
        let bjt = NpnEbersMoll::new(1e-14, 100.0, 4.0);
        let i = bjt.currents(&[-1.0, -1.0]);
        assert!(i[0].abs() < 1e-12);
        assert!(i[1].abs() < 1e-12);
    }

    #[test]
    fn triode_currents_are_negligible_deep_below_cutoff() {
        let triode = DempwolfTriode::new(100.0, 1.0e-6, 1.0, 1.5, 1.0e-6, 1.0, 1.1, 0.0);
        let i = triode.currents(&[-10.0, -10.0]);
        assert!(i[0].abs() < 1e-9);
        assert!(i[1].abs() < 1e-9);
    }

    #[test]
    fn triode_jacobian_matches_finite_difference() {
        let triode = DempwolfTriode::new(100.0, 1.0e-6, 1.0, 1.5, 1.0e-6, 1.0, 1.1, 0.0);
        let (vgk, vpk) = (-0.5, 200.0);
        let h = 1e-4;
        let i0 = triode.currents(&[vgk, vpk]);
        let i_dvgk = triode.currents(&[vgk + h, vpk]);
        let i_dvpk = triode.currents(&[vgk, vpk + h]);
        let j = triode.jacobian(&[vgk, vpk]);
        assert_relative_eq!(j[(0, 0)], (i_dvgk[0] - i0[0]) / h, max_relative = 1e-2);
        assert_relative_eq!(j[(1, 0)], (i_dvgk[1] - i0[1]) / h, max_relative = 1e-2);
        assert_relative_eq!(j[(0, 1)], (i_dvpk[0] - i0[0]) / h, epsilon = 1e-9);
        assert_relative_eq!(j[(1, 1)], (i_dvpk[1] - i0[1]) / h, max_relative = 1e-2);
    }

    #[test]
    fn npn_jacobian_matches_finite_difference() {
        let bjt = NpnEbersMoll::new(5.911e-15, 1434.0, 1.262);
        let (vbc, vbe) = (-0.2, 0.6);
        let h = 1e-6;
        let i0 = bjt.currents(&[vbc, vbe]);
        let i_dvbc = bjt.currents(&[vbc + h, vbe]);
        let i_dvbe = bjt.currents(&[vbc, vbe + h]);
        let j = bjt.jacobian(&[vbc, vbe]);
        assert_relative_eq!(j[(0, 0)], (i_dvbc[0] - i0[0]) / h, max_relative = 1e-3);
        assert_relative_eq!(j[(1, 0)], (i_dvbc[1] - i0[1]) / h, max_relative = 1e-3);
        assert_relative_eq!(j[(0, 1)], (i_dvbe[0] - i0[0]) / h, max_relative = 1e-3);
        assert_relative_eq!(j[(1, 1)], (i_dvbe[1] - i0[1]) / h, max_relative = 1e-3);
    }

    #[test]
    fn npn_forward_active_region_has_opposite_signed_port_currents() {
        let bjt = NpnEbersMoll::new(5.911e-15, 1434.0, 1.262);
        let i = bjt.currents(&[-5.0, 0.6]);
        // Forward-active (BE forward biased, BC reverse biased): i_bc is dominated by the
        // -Is*i_f term (negative), i_be by the (Is/aF)*i_f term (positive).
        assert!(i[0] < 0.0);
        assert!(i[1] > 0.0);
        assert_relative_eq!(i[0], -i[1], max_relative = 1e-2);
    }
}
