//! Per-action state.

use serde::{Deserialize, Serialize};

/// State of one action within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Dependencies not yet resolved.
    #[default]
    Waiting,
    /// Dependencies resolved, queued for dispatch.
    Ready,
    /// An activity is in flight.
    Running,
    /// Terminal: the activity returned outputs.
    Succeeded,
    /// Terminal: the activity exhausted its attempts.
    Failed,
    /// Terminal: no inbound edge fired with a matching kind.
    Skipped,
}

impl ActionState {
    /// Returns `true` once the action can never change state again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns `true` while the action counts toward the inflight set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Waiting => "waiting",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(text)
    }
}
