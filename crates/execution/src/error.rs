//! Execution model errors.

use thiserror::Error;

/// Errors raised by the execution state model.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A state transition is not valid for the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// A serialization or deserialization failure.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
