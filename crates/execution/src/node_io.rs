//! Per-attempt node I/O records.

use chrono::{DateTime, Utc};
use palisade_core::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted status of one node attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeIoStatus {
    /// The attempt is in flight.
    Running,
    /// The attempt produced outputs.
    Completed,
    /// The attempt failed.
    Failed,
    /// The action was skipped; no attempt ran.
    Skipped,
}

/// A node payload: stored inline, or spilled to blob storage when it
/// exceeds the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Small payload, stored inline.
    Inline {
        /// The value itself.
        value: Value,
    },
    /// Large payload, stored in blob storage.
    Spilled {
        /// Blob key for retrieval.
        key: String,
        /// Encoded size in bytes.
        size: u64,
    },
}

impl Payload {
    /// An inline payload.
    #[must_use]
    pub fn inline(value: Value) -> Self {
        Self::Inline { value }
    }

    /// A spilled payload reference.
    #[must_use]
    pub fn spilled(key: impl Into<String>, size: u64) -> Self {
        Self::Spilled {
            key: key.into(),
            size,
        }
    }

    /// Returns `true` if the payload was spilled.
    #[must_use]
    pub fn is_spilled(&self) -> bool {
        matches!(self, Self::Spilled { .. })
    }

    /// The inline value, if present.
    #[must_use]
    pub fn as_inline(&self) -> Option<&Value> {
        match self {
            Self::Inline { value } => Some(value),
            Self::Spilled { .. } => None,
        }
    }
}

/// Persisted I/O of one `(run, node, attempt)`.
///
/// Records reflect the final attempt; earlier attempts are retained only as
/// trace events carrying `metadata.attempt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeIoRecord {
    /// Status of the attempt.
    pub status: NodeIoStatus,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds, once finished.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Routed, coerced inputs the activity saw.
    #[serde(default)]
    pub inputs: Option<Payload>,
    /// Outputs the activity produced.
    #[serde(default)]
    pub outputs: Option<Payload>,
    /// Encoded size of `inputs` in bytes.
    #[serde(default)]
    pub inputs_size: u64,
    /// Encoded size of `outputs` in bytes.
    #[serde(default)]
    pub outputs_size: u64,
    /// Whether `inputs` was spilled.
    #[serde(default)]
    pub inputs_spilled: bool,
    /// Whether `outputs` was spilled.
    #[serde(default)]
    pub outputs_spilled: bool,
    /// Failure message, when `status == Failed`.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Failure classification, when `status == Failed`.
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
}

impl NodeIoRecord {
    /// A record for an attempt that just started.
    #[must_use]
    pub fn running() -> Self {
        Self {
            status: NodeIoStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            inputs: None,
            outputs: None,
            inputs_size: 0,
            outputs_size: 0,
            inputs_spilled: false,
            outputs_spilled: false,
            error_message: None,
            error_kind: None,
        }
    }

    /// A record for a skipped action.
    #[must_use]
    pub fn skipped() -> Self {
        let now = Utc::now();
        Self {
            status: NodeIoStatus::Skipped,
            started_at: now,
            completed_at: Some(now),
            duration_ms: Some(0),
            inputs: None,
            outputs: None,
            inputs_size: 0,
            outputs_size: 0,
            inputs_spilled: false,
            outputs_spilled: false,
            error_message: None,
            error_kind: None,
        }
    }

    /// Attach the routed inputs.
    #[must_use]
    pub fn with_inputs(mut self, payload: Payload, size: u64) -> Self {
        self.inputs_spilled = payload.is_spilled();
        self.inputs_size = size;
        self.inputs = Some(payload);
        self
    }

    /// Finish the record as completed with outputs.
    pub fn complete(&mut self, payload: Payload, size: u64) {
        let now = Utc::now();
        self.status = NodeIoStatus::Completed;
        self.outputs_spilled = payload.is_spilled();
        self.outputs_size = size;
        self.outputs = Some(payload);
        self.duration_ms = Some(elapsed_ms(self.started_at, now));
        self.completed_at = Some(now);
    }

    /// Finish the record as failed.
    pub fn fail(&mut self, message: impl Into<String>, kind: ErrorKind) {
        let now = Utc::now();
        self.status = NodeIoStatus::Failed;
        self.error_message = Some(message.into());
        self.error_kind = Some(kind);
        self.duration_ms = Some(elapsed_ms(self.started_at, now));
        self.completed_at = Some(now);
    }

    /// Returns `true` once the record is final.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status != NodeIoStatus::Running
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}
