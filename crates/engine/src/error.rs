//! Engine errors.

use palisade_core::{WorkflowId, WorkflowVersionId};
use thiserror::Error;

/// Errors raised while dispatching or orchestrating runs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No version of the workflow has been published.
    #[error("workflow {workflow_id} has no published versions")]
    DefinitionNotFound {
        /// The workflow that could not be resolved.
        workflow_id: WorkflowId,
    },

    /// The requested version does not exist.
    #[error("workflow {workflow_id} has no version {version}")]
    VersionNotFound {
        /// The workflow.
        workflow_id: WorkflowId,
        /// The requested version number.
        version: u32,
    },

    /// The requested version id does not exist.
    #[error("workflow version {version_id} does not exist")]
    VersionIdNotFound {
        /// The requested version id.
        version_id: WorkflowVersionId,
    },

    /// The dispatch request is malformed.
    #[error("invalid run dispatch: {0}")]
    InvalidDispatch(String),

    /// The scheduler ended without reporting a completion.
    #[error("run {0} ended without reporting completion")]
    RunLost(palisade_core::RunId),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] palisade_store::StoreError),

    /// A bus operation failed.
    #[error(transparent)]
    Bus(#[from] palisade_eventbus::BusError),
}
