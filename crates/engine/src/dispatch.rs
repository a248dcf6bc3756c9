//! Run dispatch requests.

use std::collections::HashMap;

use palisade_core::{NodeRef, RunId, WorkflowId, WorkflowVersionId};
use palisade_execution::{NodeOverride, SubmissionKey, Trigger};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Which published version a dispatch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// The most recently published version.
    Latest,
    /// A specific version number.
    Number(u32),
    /// A specific version id.
    Id(WorkflowVersionId),
}

/// A request to start a run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// The workflow to run.
    pub workflow_id: WorkflowId,
    /// Specific version number; mutually exclusive with `version_id`.
    pub version: Option<u32>,
    /// Specific version id; mutually exclusive with `version`.
    pub version_id: Option<WorkflowVersionId>,
    /// Runtime inputs for the entrypoint.
    pub inputs: Map<String, Value>,
    /// Per-node overrides applied before input routing.
    pub node_overrides: HashMap<NodeRef, NodeOverride>,
    /// Trigger provenance.
    pub trigger: Trigger,
    /// Submission dedupe key (≤ 128 chars).
    pub idempotency_key: Option<SubmissionKey>,
    /// Caller-chosen run id.
    pub run_id: Option<RunId>,
    /// Parent run, when dispatched by a sub-workflow call.
    pub parent_run_id: Option<RunId>,
    /// Parent node, when dispatched by a sub-workflow call.
    pub parent_node_ref: Option<NodeRef>,
}

impl RunRequest {
    /// A minimal request targeting the latest version.
    #[must_use]
    pub fn latest(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            ..Self::default()
        }
    }

    /// Set the runtime inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Add one node override.
    #[must_use]
    pub fn with_override(mut self, node_ref: NodeRef, node_override: NodeOverride) -> Self {
        self.node_overrides.insert(node_ref, node_override);
        self
    }

    /// Set the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: SubmissionKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// The version selector, validating that at most one of
    /// `version` / `version_id` is set.
    pub fn selector(&self) -> Result<VersionSelector, EngineError> {
        match (self.version, self.version_id) {
            (Some(_), Some(_)) => Err(EngineError::InvalidDispatch(
                "exactly one of `version` and `versionId` may be set".into(),
            )),
            (Some(version), None) => Ok(VersionSelector::Number(version)),
            (None, Some(version_id)) => Ok(VersionSelector::Id(version_id)),
            (None, None) => Ok(VersionSelector::Latest),
        }
    }
}
