//! Store errors.

use palisade_core::RunId;
use thiserror::Error;

/// Errors raised by the execution store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The run does not exist.
    #[error("run not found: {0}")]
    RunNotFound(RunId),

    /// A blob reference points at nothing.
    #[error("blob not found: {key}")]
    BlobMissing {
        /// The missing blob key.
        key: String,
    },

    /// A spilled payload exceeds the caller's read ceiling.
    #[error("payload of {size} bytes exceeds read ceiling of {ceiling} bytes")]
    PayloadTooLarge {
        /// Stored payload size.
        size: u64,
        /// The caller-supplied ceiling.
        ceiling: u64,
    },

    /// A state transition was rejected.
    #[error(transparent)]
    Transition(#[from] palisade_execution::ExecutionError),

    /// Serialization failure while encoding or decoding a payload.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_not_found_display() {
        let id = RunId::nil();
        let err = StoreError::RunNotFound(id);
        assert!(err.to_string().contains("run not found"));
    }

    #[test]
    fn payload_too_large_display() {
        let err = StoreError::PayloadTooLarge {
            size: 2_000_000,
            ceiling: 1_048_576,
        };
        assert!(err.to_string().contains("2000000"));
        assert!(err.to_string().contains("1048576"));
    }

    #[test]
    fn transition_error_is_transparent() {
        let inner = palisade_execution::ExecutionError::InvalidTransition {
            from: "COMPLETED".into(),
            to: "RUNNING".into(),
        };
        let err = StoreError::from(inner);
        assert_eq!(err.to_string(), "invalid transition from COMPLETED to RUNNING");
    }
}
