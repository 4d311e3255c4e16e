//! Error types for external-objective evaluation.

use thiserror::Error;

/// Error raised by a host callable. Carried through this crate unmodified.
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while evaluating an external objective.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameter, bound, or gradient vectors disagree in length.
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A constrained input lies outside its bounds.
    #[error("input {index} = {value} lies outside its bounds ({lower}, {upper})")]
    OutOfBounds {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// A configuration value is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },

    /// The value or gradient callable was used before being set.
    #[error("{role} function has not been set")]
    FunctionUnset { role: &'static str },

    /// No callable with this name is defined in the host environment.
    #[error("unknown host function: '{name}'")]
    UnknownFunction { name: String },

    /// A host callable returned a value of the wrong shape.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// The host callable itself failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl Error {
    /// Length check shared by every entry point.
    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                what,
                expected,
                found,
            })
        }
    }

    /// The original host error, if this is a host failure.
    pub fn host_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Host(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
