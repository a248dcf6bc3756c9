//! State machine transition validation.

use crate::action_state::ActionState;
use crate::error::ExecutionError;
use crate::status::RunStatus;

/// Returns `true` if the run-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_run(from: RunStatus, to: RunStatus) -> bool {
    matches!(
        (from, to),
        (RunStatus::Queued, RunStatus::Running)
            | (RunStatus::Queued, RunStatus::Cancelled)
            | (RunStatus::Queued, RunStatus::Terminated)
            | (RunStatus::Running, RunStatus::Completed)
            | (RunStatus::Running, RunStatus::Failed)
            | (RunStatus::Running, RunStatus::Cancelled)
            | (RunStatus::Running, RunStatus::Terminated)
            | (RunStatus::Running, RunStatus::TimedOut)
    )
}

/// Validate a run-level transition.
pub fn validate_run_transition(from: RunStatus, to: RunStatus) -> Result<(), ExecutionError> {
    if can_transition_run(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Returns `true` if the action-level transition from `from` to `to` is valid.
///
/// `Running → Running` is deliberately allowed: a retry stays in `Running`
/// across attempts; earlier attempts survive only as trace events.
#[must_use]
pub fn can_transition_action(from: ActionState, to: ActionState) -> bool {
    matches!(
        (from, to),
        (ActionState::Waiting, ActionState::Ready)
            | (ActionState::Waiting, ActionState::Skipped)
            | (ActionState::Ready, ActionState::Running)
            | (ActionState::Running, ActionState::Running)
            | (ActionState::Running, ActionState::Succeeded)
            | (ActionState::Running, ActionState::Failed)
    )
}

/// Validate an action-level transition.
pub fn validate_action_transition(
    from: ActionState,
    to: ActionState,
) -> Result<(), ExecutionError> {
    if can_transition_action(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
