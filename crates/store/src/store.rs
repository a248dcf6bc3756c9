//! The execution store trait.

use async_trait::async_trait;
use palisade_core::{MAX_RUN_LIST_LIMIT, NodeRef, RunId, WorkflowId};
use palisade_execution::{
    NewRun, NodeIoRecord, Run, RunFailure, RunProgress, RunStatus, TraceEvent,
};

use crate::error::StoreError;

/// One page of a run's event log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    /// Events with strictly increasing ids.
    pub events: Vec<TraceEvent>,
    /// Cursor to resume from (the id of the last event returned, or the
    /// requested cursor when the page is empty).
    pub next_cursor: u64,
}

/// Filter for listing runs.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Restrict to one workflow.
    pub workflow_id: Option<WorkflowId>,
    /// Restrict to one status.
    pub status: Option<RunStatus>,
    /// Maximum rows; clamped to the shared bound.
    pub limit: Option<usize>,
}

impl RunFilter {
    /// The effective row limit.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(MAX_RUN_LIST_LIMIT)
            .min(MAX_RUN_LIST_LIMIT)
    }
}

/// The canonical persistence seam.
///
/// Contract:
/// - every write is idempotent under its `(run, node, attempt)` key;
/// - `append_events` persists all events of a call or none, and assigns
///   strictly increasing, gap-free ids per run;
/// - `create_run` deduplicates by idempotency key within the store's window;
/// - writers for one run are serialised by the caller (the run's scheduler
///   loop), the store itself only promises per-call atomicity.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Create a run, or return the existing one for a duplicate
    /// idempotency key within the window.
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError>;

    /// Fetch a run.
    async fn get_run(&self, run_id: RunId) -> Result<Run, StoreError>;

    /// Transition a run's status, attaching a failure when terminal-failed.
    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        failure: Option<RunFailure>,
    ) -> Result<(), StoreError>;

    /// Update a run's progress counters.
    async fn update_progress(&self, run_id: RunId, progress: RunProgress)
    -> Result<(), StoreError>;

    /// Insert or replace the I/O record of `(run, node, attempt)`.
    async fn upsert_node_io(
        &self,
        run_id: RunId,
        node_ref: NodeRef,
        attempt: u32,
        record: NodeIoRecord,
    ) -> Result<(), StoreError>;

    /// Fetch the I/O record of `(run, node, attempt)`.
    async fn get_node_io(
        &self,
        run_id: RunId,
        node_ref: NodeRef,
        attempt: u32,
    ) -> Result<Option<NodeIoRecord>, StoreError>;

    /// Append events to a run's log, assigning ids. Returns the new cursor
    /// (the id of the last appended event).
    async fn append_events(
        &self,
        run_id: RunId,
        events: Vec<TraceEvent>,
    ) -> Result<u64, StoreError>;

    /// Read events with ids greater than `from_cursor`, up to `limit`.
    async fn list_events(
        &self,
        run_id: RunId,
        from_cursor: Option<u64>,
        limit: usize,
    ) -> Result<EventPage, StoreError>;

    /// List runs matching a filter, most recent first.
    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<Run>, StoreError>;
}
