//! Progress events emitted by running components.

use palisade_core::EventLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// One progress report from an in-flight activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Severity.
    #[serde(default)]
    pub level: EventLevel,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProgressEvent {
    /// An info-level progress message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Info,
            message: message.into(),
            data: None,
        }
    }

    /// A debug-level progress message.
    #[must_use]
    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Debug,
            message: message.into(),
            data: None,
        }
    }

    /// A warning.
    #[must_use]
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Warn,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Sending half of the progress channel, held by the activity context.
///
/// Sends are non-blocking from the component's perspective; the runtime end
/// forwards into the trace bus and may slow down, but events are never
/// dropped while the activity lives.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink {
    /// Create a sink/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit one progress event. Silently a no-op once the runtime side has
    /// finished the activity.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}
