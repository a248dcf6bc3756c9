//! The persisted run record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use palisade_core::{ErrorKind, NodeRef, RunId, WorkflowId, WorkflowVersionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExecutionError;
use crate::idempotency::SubmissionKey;
use crate::status::RunStatus;
use crate::transition::validate_run_transition;

/// What initiated a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A user pressed run.
    #[default]
    Manual,
    /// A schedule fired.
    Schedule,
    /// An API client dispatched it.
    Api,
}

/// Trigger provenance of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Trigger {
    /// Kind of trigger.
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Id of the triggering source (schedule id, API client id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Display label for the trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Per-node override applied on top of compiled params before routing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOverride {
    /// Parameter values replacing compiled ones, key by key.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Manual input values replacing routed ones, port by port.
    #[serde(default)]
    pub input_overrides: Map<String, Value>,
}

/// Progress counters of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    /// Actions that reached a terminal state.
    pub completed_actions: usize,
    /// Total actions in the definition.
    pub total_actions: usize,
}

/// Terminal failure of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Component-supplied message.
    pub reason: String,
    /// Taxonomy classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Bounded structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Everything needed to create a run.
#[derive(Debug, Clone, Default)]
pub struct NewRun {
    /// Caller-chosen run id; generated when absent.
    pub run_id: Option<RunId>,
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// The immutable version being run.
    pub workflow_version_id: WorkflowVersionId,
    /// Monotonic version number of that version.
    pub workflow_version: u32,
    /// Trigger provenance.
    pub trigger: Trigger,
    /// Runtime inputs for the entrypoint.
    pub inputs: Map<String, Value>,
    /// Per-node overrides.
    pub node_overrides: HashMap<NodeRef, NodeOverride>,
    /// Parent linkage for sub-workflow runs.
    pub parent_run_id: Option<RunId>,
    /// Node in the parent that spawned this run.
    pub parent_node_ref: Option<NodeRef>,
    /// Submission dedupe key.
    pub idempotency_key: Option<SubmissionKey>,
    /// Total actions, seeded from the definition.
    pub total_actions: usize,
}

/// One execution instance of a compiled workflow version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Unique run id.
    pub run_id: RunId,
    /// The workflow.
    pub workflow_id: WorkflowId,
    /// The immutable version executed.
    pub workflow_version_id: WorkflowVersionId,
    /// Version number.
    pub workflow_version: u32,
    /// Current status.
    pub status: RunStatus,
    /// When the run was accepted.
    pub started_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Trigger provenance.
    #[serde(default)]
    pub trigger: Trigger,
    /// Parent run, for sub-workflow calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<RunId>,
    /// Parent node, for sub-workflow calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node_ref: Option<NodeRef>,
    /// Runtime inputs.
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Per-node overrides.
    #[serde(default)]
    pub node_overrides: HashMap<NodeRef, NodeOverride>,
    /// Progress counters.
    pub progress: RunProgress,
    /// Terminal failure, when `status` is a failure state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl Run {
    /// Materialize a queued run from a descriptor.
    #[must_use]
    pub fn create(new: NewRun) -> Self {
        let now = Utc::now();
        Self {
            run_id: new.run_id.unwrap_or_else(RunId::v4),
            workflow_id: new.workflow_id,
            workflow_version_id: new.workflow_version_id,
            workflow_version: new.workflow_version,
            status: RunStatus::Queued,
            started_at: now,
            updated_at: now,
            completed_at: None,
            trigger: new.trigger,
            parent_run_id: new.parent_run_id,
            parent_node_ref: new.parent_node_ref,
            inputs: new.inputs,
            node_overrides: new.node_overrides,
            progress: RunProgress {
                completed_actions: 0,
                total_actions: new.total_actions,
            },
            failure: None,
        }
    }

    /// Transition the status, validating and stamping timestamps.
    pub fn transition(&mut self, to: RunStatus) -> Result<(), ExecutionError> {
        validate_run_transition(self.status, to)?;
        self.status = to;
        self.updated_at = Utc::now();
        if to.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Record that one more action reached a terminal state.
    pub fn record_action_completion(&mut self) {
        self.progress.completed_actions =
            (self.progress.completed_actions + 1).min(self.progress.total_actions);
        self.updated_at = Utc::now();
    }

    /// Attach the terminal failure.
    pub fn set_failure(&mut self, failure: RunFailure) {
        self.failure = Some(failure);
    }

    /// The override for a node, if any.
    #[must_use]
    pub fn override_for(&self, node_ref: &NodeRef) -> Option<&NodeOverride> {
        self.node_overrides.get(node_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn new_run() -> NewRun {
        NewRun {
            workflow_id: WorkflowId::v4(),
            workflow_version_id: WorkflowVersionId::v4(),
            workflow_version: 3,
            total_actions: 4,
            ..NewRun::default()
        }
    }

    #[test]
    fn create_starts_queued() {
        let run = Run::create(new_run());
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.progress.completed_actions, 0);
        assert_eq!(run.progress.total_actions, 4);
        assert!(run.completed_at.is_none());
        assert!(run.failure.is_none());
    }

    #[test]
    fn create_respects_supplied_run_id() {
        let id = RunId::v4();
        let run = Run::create(NewRun {
            run_id: Some(id),
            ..new_run()
        });
        assert_eq!(run.run_id, id);
    }

    #[test]
    fn valid_lifecycle() {
        let mut run = Run::create(new_run());
        run.transition(RunStatus::Running).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.completed_at.is_none());

        run.transition(RunStatus::Completed).unwrap();
        assert!(run.status.is_terminal());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut run = Run::create(new_run());
        let err = run.transition(RunStatus::Completed).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[test]
    fn terminal_is_absorbing() {
        let mut run = Run::create(new_run());
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Failed).unwrap();
        assert!(run.transition(RunStatus::Running).is_err());
        assert!(run.transition(RunStatus::Completed).is_err());
    }

    #[test]
    fn progress_is_capped_at_total() {
        let mut run = Run::create(NewRun {
            total_actions: 2,
            ..new_run()
        });
        run.record_action_completion();
        run.record_action_completion();
        run.record_action_completion();
        assert_eq!(run.progress.completed_actions, 2);
    }

    #[test]
    fn failure_attaches() {
        let mut run = Run::create(new_run());
        run.transition(RunStatus::Running).unwrap();
        run.set_failure(RunFailure {
            reason: "auth expired".into(),
            kind: Some(ErrorKind::Authentication),
            details: Some(json!({"provider": "x"})),
        });
        run.transition(RunStatus::Failed).unwrap();
        let failure = run.failure.unwrap();
        assert_eq!(failure.kind, Some(ErrorKind::Authentication));
        assert_eq!(failure.reason, "auth expired");
    }

    #[test]
    fn override_lookup() {
        let node = NodeRef::new("enrich").unwrap();
        let mut overrides = HashMap::new();
        overrides.insert(
            node.clone(),
            NodeOverride {
                params: serde_json::from_value(json!({"depth": 5})).unwrap(),
                input_overrides: Map::new(),
            },
        );
        let run = Run::create(NewRun {
            node_overrides: overrides,
            ..new_run()
        });
        assert_eq!(run.override_for(&node).unwrap().params["depth"], 5);
        assert!(run.override_for(&NodeRef::new("other").unwrap()).is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let mut run = Run::create(new_run());
        run.transition(RunStatus::Running).unwrap();
        let json = serde_json::to_string(&run).unwrap();
        let back: Run = serde_json::from_str(&json).unwrap();
        assert_eq!(run, back);
    }

    #[test]
    fn serde_wire_names() {
        let run = Run::create(new_run());
        let json = serde_json::to_value(&run).unwrap();
        assert!(json.get("runId").is_some());
        assert!(json.get("workflowVersionId").is_some());
        assert_eq!(json["status"], "QUEUED");
        assert_eq!(json["progress"]["totalActions"], 4);
        assert_eq!(json["trigger"]["type"], "manual");
    }
}
