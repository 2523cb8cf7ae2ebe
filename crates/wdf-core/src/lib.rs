//! # wdf-core
//!
//! Linear-algebra binding and multivariate root finder shared by the `wdf` crate. This crate
//! holds everything the engine treats as an "external dependency" in the specification sense:
//! dense matrix/vector operations (bound to [`nalgebra`]) and the Newton-Raphson solver built on
//! top of them.
#![warn(missing_docs)]

pub mod linalg;
pub mod nr;

pub use linalg::{Matrix, Vector};
pub use nr::{NewtonSolver, RootEq, SolveResult};
