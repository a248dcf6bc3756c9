//! In-memory reference implementation of the execution store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use palisade_core::{NodeRef, RunId};
use palisade_execution::{
    NewRun, NodeIoRecord, Run, RunFailure, RunProgress, RunStatus, TraceEvent,
};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::StoreError;
use crate::store::{EventPage, ExecutionStore, RunFilter};

/// Default submission-dedupe window.
const DEFAULT_IDEMPOTENCY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// In-process store backing tests, the CLI and single-node deployments.
///
/// Event logs are per-run vectors guarded by a mutex, which gives
/// `append_events` its all-or-nothing guarantee and keeps assigned ids
/// gap-free.
pub struct MemoryStore {
    runs: DashMap<RunId, Run>,
    node_io: DashMap<(RunId, NodeRef, u32), NodeIoRecord>,
    events: DashMap<RunId, Mutex<Vec<TraceEvent>>>,
    submissions: DashMap<String, (RunId, DateTime<Utc>)>,
    idempotency_window: chrono::Duration,
}

impl MemoryStore {
    /// A store with the default 24 h idempotency window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_idempotency_window(DEFAULT_IDEMPOTENCY_WINDOW)
    }

    /// A store with an explicit idempotency window.
    #[must_use]
    pub fn with_idempotency_window(window: Duration) -> Self {
        Self {
            runs: DashMap::new(),
            node_io: DashMap::new(),
            events: DashMap::new(),
            submissions: DashMap::new(),
            idempotency_window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
        }
    }

    fn mutate_run(
        &self,
        run_id: RunId,
        mutate: impl FnOnce(&mut Run) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        mutate(entry.value_mut())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError> {
        if let Some(key) = &new.idempotency_key {
            if let Some(entry) = self.submissions.get(key.as_str()) {
                let (existing, seen_at) = entry.value();
                if Utc::now() - *seen_at <= self.idempotency_window {
                    let run_id = *existing;
                    drop(entry);
                    trace!(%run_id, key = %key, "duplicate submission within window");
                    return self.get_run(run_id).await;
                }
                drop(entry);
                self.submissions.remove(key.as_str());
            }
        }

        let run = Run::create(new.clone());
        if let Some(key) = &new.idempotency_key {
            self.submissions
                .insert(key.as_str().to_owned(), (run.run_id, Utc::now()));
        }
        self.runs.insert(run.run_id, run.clone());
        self.events.insert(run.run_id, Mutex::new(Vec::new()));
        Ok(run)
    }

    async fn get_run(&self, run_id: RunId) -> Result<Run, StoreError> {
        self.runs
            .get(&run_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::RunNotFound(run_id))
    }

    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        failure: Option<RunFailure>,
    ) -> Result<(), StoreError> {
        self.mutate_run(run_id, |run| {
            run.transition(status)?;
            if let Some(failure) = failure {
                run.set_failure(failure);
            }
            Ok(())
        })
    }

    async fn update_progress(
        &self,
        run_id: RunId,
        progress: RunProgress,
    ) -> Result<(), StoreError> {
        self.mutate_run(run_id, |run| {
            run.progress = progress;
            run.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn upsert_node_io(
        &self,
        run_id: RunId,
        node_ref: NodeRef,
        attempt: u32,
        record: NodeIoRecord,
    ) -> Result<(), StoreError> {
        if !self.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        self.node_io.insert((run_id, node_ref, attempt), record);
        Ok(())
    }

    async fn get_node_io(
        &self,
        run_id: RunId,
        node_ref: NodeRef,
        attempt: u32,
    ) -> Result<Option<NodeIoRecord>, StoreError> {
        Ok(self
            .node_io
            .get(&(run_id, node_ref, attempt))
            .map(|entry| entry.value().clone()))
    }

    async fn append_events(
        &self,
        run_id: RunId,
        events: Vec<TraceEvent>,
    ) -> Result<u64, StoreError> {
        let log = self
            .events
            .get(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        let mut log = log.lock();
        let mut next_id = log.len() as u64;
        for mut event in events {
            next_id += 1;
            event.id = next_id;
            log.push(event);
        }
        Ok(next_id)
    }

    async fn list_events(
        &self,
        run_id: RunId,
        from_cursor: Option<u64>,
        limit: usize,
    ) -> Result<EventPage, StoreError> {
        let log = self
            .events
            .get(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        let log = log.lock();
        let cursor = from_cursor.unwrap_or(0);
        let events: Vec<TraceEvent> = log
            .iter()
            .filter(|e| e.id > cursor)
            .take(limit)
            .cloned()
            .collect();
        let next_cursor = events.last().map_or(cursor, |e| e.id);
        Ok(EventPage {
            events,
            next_cursor,
        })
    }

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self
            .runs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|run| {
                filter.workflow_id.is_none_or(|id| run.workflow_id == id)
                    && filter.status.is_none_or(|status| run.status == status)
            })
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(filter.effective_limit());
        Ok(runs)
    }
}
