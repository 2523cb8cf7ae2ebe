//! # Linear algebra binding
//!
//! The engine treats dense real linear algebra as an external dependency (see PURPOSE & SCOPE
//! in the specification). This module is the seam: everything above it talks in terms of
//! [`Matrix`] and `Vector`, and only this file knows that the backend is [`nalgebra`].
use nalgebra::{DMatrix, DVector, LU};

/// Dense, dynamically-sized real matrix.
pub type Matrix = DMatrix<f64>;
/// Dense, dynamically-sized real column vector.
pub type Vector = DVector<f64>;

/// Build a square identity matrix of the given size.
pub fn identity(n: usize) -> Matrix {
    Matrix::identity(n, n)
}

/// Build a `rows x cols` matrix filled with zeros.
pub fn zeros(rows: usize, cols: usize) -> Matrix {
    Matrix::zeros(rows, cols)
}

/// Solve `a * x = b` for `x` using an LU factorization of `a`.
///
/// Returns `None` when `a` is singular (or too ill-conditioned for `nalgebra` to factor),
/// mirroring the contract that a Newton step with a non-invertible Jacobian simply has no
/// well-defined solution this iteration.
pub fn solve(a: &Matrix, b: &Vector) -> Option<Vector> {
    LU::new(a.clone()).solve(b)
}

/// Try to invert a square matrix, returning `None` when it is singular.
pub fn try_inverse(a: &Matrix) -> Option<Matrix> {
    a.clone().try_inverse()
}
