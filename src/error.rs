//! Error taxonomy.
//!
//! Configuration problems surface as [`SimError`] and abort a run. A failed
//! steady-state solve surfaces as [`SolverError`] and only degrades the one
//! sensor reading it belongs to.

use thiserror::Error;

/// Errors that abort a simulation run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("{what} index ({x}, {y}) outside grid of shape ({nx}, {ny})")]
    OutOfBounds {
        what: &'static str,
        x: usize,
        y: usize,
        nx: usize,
        ny: usize,
    },
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Failure of the steady-state density-matrix solve for a single reading.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("Liouvillian system is singular")]
    Singular,

    #[error("steady state contains non-finite entries")]
    NonFinite,

    #[error("steady state has vanishing trace ({0:e})")]
    TraceVanished(f64),

    #[error("invalid ladder parameter `{0}`")]
    InvalidParameter(&'static str),
}

/// Check that a scalar parameter is finite and strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimError::invalid(name, format!("must be finite and > 0, got {value}")));
    }
    Ok(())
}

/// Check that a scalar parameter is finite and not negative.
pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::invalid(name, format!("must be finite and >= 0, got {value}")));
    }
    Ok(())
}

/// Check that a scalar parameter is finite.
pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() {
        return Err(SimError::invalid(name, format!("must be finite, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_check_rejects_zero_and_nan() {
        assert!(require_positive("dt", 0.0).is_err());
        assert!(require_positive("dt", f64::NAN).is_err());
        assert!(require_positive("dt", 1e-9).is_ok());
    }

    #[test]
    fn non_negative_accepts_zero() {
        assert!(require_non_negative("sigma", 0.0).is_ok());
        assert!(require_non_negative("sigma", -1e-12).is_err());
    }

    #[test]
    fn messages_name_the_parameter() {
        let err = require_positive("total_time_yr", -1.0).unwrap_err();
        assert!(err.to_string().contains("total_time_yr"));
    }
}
