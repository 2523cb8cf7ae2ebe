//! Error taxonomy for the engine.
//!
//! Mirrors the split the specification draws between recoverable setup mistakes
//! (bad component values, malformed topology) and the matrix-level failures a
//! user-supplied R-type adapter can provoke. Non-convergence of the non-linear root
//! is deliberately *not* an error here: it is reported through
//! [`crate::tree::Tree::last_solve_converged`] so a host can keep rendering audio with the
//! best estimate found, per the specification's non-fatal-degradation requirement.
use thiserror::Error;

/// Errors produced while building or adapting a tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WdfError {
    /// A component, port, or topology setting is out of its valid domain, e.g. a
    /// non-positive resistance, capacitance, inductance, or sample rate.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A matrix produced or consumed during adaptation is malformed: wrong shape,
    /// singular where invertibility is required, or otherwise unusable.
    #[error("matrix error: {0}")]
    Matrix(String),
}

impl WdfError {
    /// Build a [`WdfError::Configuration`] from any displayable message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a [`WdfError::Matrix`] from any displayable message.
    pub fn matrix(message: impl Into<String>) -> Self {
        Self::Matrix(message.into())
    }
}
