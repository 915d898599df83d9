//! Error types for probe-core

use thiserror::Error;

/// Result type alias for probe-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Request validation error
    #[error("validation failed: {0}")]
    Validation(String),

    /// Probe parameter error
    #[error("check {index} ({kind}): {reason}")]
    CheckParams {
        /// Position of the check in the task
        index: usize,
        /// Probe kind as received
        kind: String,
        /// Why normalization failed
        reason: String,
    },

    /// Unknown probe kind
    #[error("unsupported check type {0:?}")]
    UnsupportedCheck(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a check parameter error
    pub fn check_params(index: usize, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CheckParams {
            index,
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("empty target");
        assert!(err.to_string().contains("validation failed"));

        let err = Error::check_params(2, "http", "bad range");
        assert_eq!(err.to_string(), "check 2 (http): bad range");

        let err = Error::UnsupportedCheck("smtp".to_string());
        assert!(err.to_string().contains("smtp"));
    }
}
