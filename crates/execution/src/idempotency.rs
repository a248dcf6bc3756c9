//! Idempotency keys.
//!
//! Two distinct keys live here:
//!
//! - [`ActivityKey`] — derived from `(run, node, attempt)`, the identity
//!   under which every store write is idempotent and replays are safe;
//! - [`SubmissionKey`] — a client-chosen, bounded string that deduplicates
//!   run submissions within the store's configured window.

use std::fmt;

use palisade_core::{MAX_IDEMPOTENCY_KEY_LEN, NodeRef, RunId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deterministic key identifying one activity attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityKey(String);

impl ActivityKey {
    /// Derive the key for `(run, node, attempt)`.
    #[must_use]
    pub fn new(run_id: RunId, node_ref: &NodeRef, attempt: u32) -> Self {
        Self(format!("{run_id}:{node_ref}:{attempt}"))
    }

    /// The underlying key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error constructing a [`SubmissionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionKeyError {
    /// The key was empty.
    #[error("idempotency key must not be empty")]
    Empty,

    /// The key exceeded the bound.
    #[error("idempotency key exceeds {MAX_IDEMPOTENCY_KEY_LEN} chars: {len}")]
    TooLong {
        /// Length of the rejected key.
        len: usize,
    },
}

/// Client-chosen run-submission idempotency key, bounded to 128 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmissionKey(String);

impl SubmissionKey {
    /// Validate and wrap a submission key.
    pub fn new(value: impl Into<String>) -> Result<Self, SubmissionKeyError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SubmissionKeyError::Empty);
        }
        let len = value.chars().count();
        if len > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(SubmissionKeyError::TooLong { len });
        }
        Ok(Self(value))
    }

    /// The underlying key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubmissionKey {
    type Error = SubmissionKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubmissionKey> for String {
    fn from(value: SubmissionKey) -> Self {
        value.0
    }
}
