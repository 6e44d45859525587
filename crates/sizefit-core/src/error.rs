//! Job-level errors returned by the compression engine.
//!
//! Failures of individual encode trials never show up here; the engine logs
//! them and drops the trial. A result that misses the target is not an error
//! either, it comes back as `Ok` with `exact_match == false`.

use thiserror::Error;

use crate::decode::{DecodeError, ValidationError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input rejected before admission.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Concurrency ceiling reached; the caller may retry later.
    #[error("Server busy: {active} of {limit} compression jobs running, retry later")]
    Busy { active: usize, limit: usize },

    /// Input passed validation but could not be decoded.
    #[error("Failed to decode input: {0}")]
    Decode(#[from] DecodeError),

    /// The job produced more encoded bytes than its memory ceiling allows.
    #[error("Job memory limit exceeded: {used} bytes of encoded output, limit {limit}")]
    ResourceLimit { used: u64, limit: u64 },

    /// Every encode attempt failed.
    #[error("Compression failed: none of {attempts} encode attempts succeeded")]
    CompressionFailed { attempts: u32 },
}

impl EngineError {
    /// Whether the same request could succeed if simply retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Busy { .. })
    }

    /// Whether the failure was caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::Validation(_) | EngineError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_validation_error() {
        let err: EngineError = ValidationError::Empty.into();
        assert!(matches!(err, EngineError::Validation(ValidationError::Empty)));
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_busy_is_retryable() {
        let err = EngineError::Busy {
            active: 4,
            limit: 4,
        };
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Server busy: 4 of 4 compression jobs running, retry later"
        );
    }

    #[test]
    fn test_failure_classification() {
        let err = EngineError::CompressionFailed { attempts: 12 };
        assert!(!err.is_client_error());
        assert!(!err.is_retryable());
    }
}
