//! Error taxonomy shared by every gate layer.
//!
//! "Suspicious" is never an error: screening verdicts are ordinary values.
//! Only sandbox escapes, I/O failures and malformed signature registrations
//! surface here.

use thiserror::Error;

/// Errors raised by the file gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Containment failed. `reason` is safe to show to the caller: it never
    /// includes the canonical path the request resolved to.
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    /// The target could not be opened, stat'd or read.
    #[error("I/O error: {reason}")]
    Io { reason: String },

    /// A signature registration was rejected; the registry is unchanged.
    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },
}

impl GateError {
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io {
            reason: reason.into(),
        }
    }

    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
