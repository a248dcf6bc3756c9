//! Run-level status.

use serde::{Deserialize, Serialize};

/// The overall status of a workflow run.
///
/// Serialized in the wire format's upper-case form (e.g. `"RUNNING"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Accepted, waiting for a worker.
    Queued,
    /// The scheduler loop is live.
    Running,
    /// Every action resolved and none failed the run.
    Completed,
    /// An unrouted action failure ended the run.
    Failed,
    /// Gracefully cancelled; in-flight activities were drained.
    Cancelled,
    /// Abortively terminated; in-flight activities were cut off.
    Terminated,
    /// The run-level deadline expired.
    TimedOut,
}

impl RunStatus {
    /// Returns `true` once the run can never change status again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    /// Returns `true` if the run ended without failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The wire tag (e.g. `"TIMED_OUT"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Terminated => "TERMINATED",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
