//! Gap-free replay + live tail reading.

use std::collections::VecDeque;
use std::sync::Arc;

use palisade_core::RunId;
use palisade_execution::TraceEvent;
use palisade_store::ExecutionStore;

use crate::bus::{BusSubscription, TraceBus};
use crate::error::BusError;

/// Page size used while replaying the stored prefix.
const REPLAY_PAGE: usize = 256;

/// Reads a run's events from a cursor: first the stored prefix, then the
/// live tail, without gaps or duplicates.
///
/// The live subscription is attached *before* replay starts, so events
/// published during replay are buffered in the channel; the id guard drops
/// anything replay already delivered.
pub struct EventReader {
    store: Arc<dyn ExecutionStore>,
    run_id: RunId,
    subscription: BusSubscription,
    buffered: VecDeque<TraceEvent>,
    replay_cursor: u64,
    replaying: bool,
    last_seen: u64,
}

impl EventReader {
    /// Attach a reader starting after `from_cursor` (0 = from the start).
    #[must_use]
    pub fn attach(bus: &TraceBus, run_id: RunId, from_cursor: u64) -> Self {
        Self {
            store: Arc::clone(bus.store()),
            run_id,
            subscription: bus.subscribe(run_id),
            buffered: VecDeque::new(),
            replay_cursor: from_cursor,
            replaying: true,
            last_seen: from_cursor,
        }
    }

    /// The id of the last delivered event.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.last_seen
    }

    /// The next event, or `None` once the run's channel closed and
    /// everything stored has been delivered.
    pub async fn next(&mut self) -> Result<Option<TraceEvent>, BusError> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                self.last_seen = event.id;
                return Ok(Some(event));
            }

            if self.replaying {
                let page = self
                    .store
                    .list_events(self.run_id, Some(self.replay_cursor), REPLAY_PAGE)
                    .await?;
                if page.events.is_empty() {
                    self.replaying = false;
                } else {
                    self.replay_cursor = page.next_cursor;
                    self.buffered.extend(page.events);
                }
                continue;
            }

            match self.subscription.next().await? {
                Some(event) => {
                    // Replay already delivered this prefix.
                    if event.id <= self.last_seen {
                        continue;
                    }
                    self.last_seen = event.id;
                    return Ok(Some((*event).clone()));
                }
                None => {
                    // Channel closed. Catch up on anything the store gained
                    // between our last page and the close.
                    let page = self
                        .store
                        .list_events(self.run_id, Some(self.last_seen), REPLAY_PAGE)
                        .await?;
                    if page.events.is_empty() {
                        return Ok(None);
                    }
                    self.buffered.extend(page.events);
                }
            }
        }
    }

    /// Drain every remaining event into a vector (for terminated runs).
    pub async fn drain(mut self) -> Result<Vec<TraceEvent>, BusError> {
        let mut all = Vec::new();
        while let Some(event) = self.next().await? {
            all.push(event);
        }
        Ok(all)
    }
}
