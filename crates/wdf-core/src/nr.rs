//! Multivariate root finding via Newton-Raphson, used to close the non-linear WDF root.
use crate::linalg::{self, Matrix, Vector};

/// An implicit vector equation `F(x) = 0`, together with its Jacobian.
///
/// Root equations are solved with numerical methods such as Newton-Raphson when linear algebra
/// alone cannot solve the system, e.g. because device models are non-linear.
pub trait RootEq {
    /// Evaluate `F` at `x`.
    fn eval(&self, x: &Vector) -> Vector;

    /// Evaluate the Jacobian of `F` at `x`. Returning `None` signals that the Jacobian could not
    /// be formed (e.g. a device model refused to evaluate); the solver then stops and returns the
    /// best `x` found so far.
    fn jacobian(&self, x: &Vector) -> Option<Matrix>;
}

/// Outcome of a [`NewtonSolver::solve`] call.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Solution vector (best estimate found, whether or not iteration converged).
    pub x: Vector,
    /// Number of iterations actually performed.
    pub iterations: usize,
    /// Whether `‖F(x)‖₂ < tolerance` was reached before `max_iterations`.
    pub converged: bool,
}

/// Newton-Raphson solver for `F(x) = 0`.
///
/// Each step solves the linear system `J(x) * p = -F(x)` via LU factorization (see
/// [`linalg::solve`]) rather than forming `J^-1` explicitly, and applies `x <- x + damping * p`.
/// `damping` is `1.0` (undamped) by default; the specification calls out damped line search as a
/// possible future addition that is not exercised by any model in the current catalog.
#[derive(Debug, Clone, Copy)]
pub struct NewtonSolver {
    /// Convergence threshold on the Euclidean norm of `F(x)`.
    pub tolerance: f64,
    /// Hard cap on the number of iterations.
    pub max_iterations: usize,
    /// Step scaling factor; `1.0` reproduces the reference undamped behavior.
    pub damping: f64,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 50,
            damping: 1.0,
        }
    }
}

impl NewtonSolver {
    /// Run the solver from the given initial guess.
    pub fn solve(&self, equation: &impl RootEq, initial_guess: Vector) -> SolveResult {
        let mut x = initial_guess;
        for iteration in 0..self.max_iterations {
            let f = equation.eval(&x);
            let residual = f.norm();
            if !residual.is_finite() {
                return SolveResult {
                    x,
                    iterations: iteration,
                    converged: false,
                };
            }
            if residual < self.tolerance {
                return SolveResult {
                    x,
                    iterations: iteration,
                    converged: true,
                };
            }
            let Some(jacobian) = equation.jacobian(&x) else {
                return SolveResult {
                    x,
                    iterations: iteration,
                    converged: false,
                };
            };
            let neg_f = -f;
            let Some(step) = linalg::solve(&jacobian, &neg_f) else {
                return SolveResult {
                    x,
                    iterations: iteration,
                    converged: false,
                };
            };
            if !step.iter().all(|v| v.is_finite()) {
                return SolveResult {
                    x,
                    iterations: iteration,
                    converged: false,
                };
            }
            x += step * self.damping;
        }
        let converged = equation.eval(&x).norm() < self.tolerance;
        SolveResult {
            x,
            iterations: self.max_iterations,
            converged,
        }
    }
}
