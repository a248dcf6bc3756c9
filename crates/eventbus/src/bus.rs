//! The trace bus.

use std::sync::Arc;

use dashmap::DashMap;
use palisade_core::RunId;
use palisade_execution::TraceEvent;
use palisade_store::ExecutionStore;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use crate::error::BusError;

/// Default per-run live channel capacity before slow readers are evicted.
const DEFAULT_CAPACITY: usize = 1024;

struct RunChannel {
    /// Serialises append + broadcast so live order equals store order.
    publish_lock: Mutex<()>,
    tx: broadcast::Sender<Arc<TraceEvent>>,
}

/// Fan-out hub for per-run trace events.
///
/// `publish` persists the batch through the store (which assigns the ids)
/// and then broadcasts the same events, under a per-run lock so no reader
/// can observe an order different from the stored one.
pub struct TraceBus {
    store: Arc<dyn ExecutionStore>,
    channels: DashMap<RunId, Arc<RunChannel>>,
    closed: DashMap<RunId, ()>,
    capacity: usize,
}

impl TraceBus {
    /// A bus persisting through `store` with the default live capacity.
    #[must_use]
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    /// A bus with an explicit live channel capacity.
    #[must_use]
    pub fn with_capacity(store: Arc<dyn ExecutionStore>, capacity: usize) -> Self {
        Self {
            store,
            channels: DashMap::new(),
            closed: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// The store this bus persists through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    fn channel(&self, run_id: RunId) -> Arc<RunChannel> {
        self.channels
            .entry(run_id)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                Arc::new(RunChannel {
                    publish_lock: Mutex::new(()),
                    tx,
                })
            })
            .clone()
    }

    /// Persist a batch of draft events and fan them out live.
    ///
    /// Returns the new cursor. The batch is atomic: on a store failure
    /// nothing is broadcast. An empty batch is a no-op returning cursor 0.
    pub async fn publish(
        &self,
        run_id: RunId,
        events: Vec<TraceEvent>,
    ) -> Result<u64, BusError> {
        if events.is_empty() {
            return Ok(0);
        }
        if self.closed.contains_key(&run_id) {
            // Late writer after terminal close: persist, nothing live.
            return Ok(self.store.append_events(run_id, events).await?);
        }

        let channel = self.channel(run_id);
        let _guard = channel.publish_lock.lock().await;

        let count = events.len() as u64;
        let mut to_send = events.clone();
        let cursor = self.store.append_events(run_id, events).await?;

        // The store assigned the contiguous range ending at `cursor`.
        let first_id = cursor - count + 1;
        for (offset, event) in to_send.iter_mut().enumerate() {
            event.id = first_id + offset as u64;
        }
        for event in to_send {
            // No live subscribers is fine; durability already happened.
            let _ = channel.tx.send(Arc::new(event));
        }
        Ok(cursor)
    }

    /// Attach a live subscriber to a run's channel.
    ///
    /// The subscription sees every event published after this call, in id
    /// order. Subscribing to an already-closed run yields an immediately
    /// ended stream. Use [`EventReader`](crate::EventReader) to also replay
    /// the stored prefix.
    #[must_use]
    pub fn subscribe(&self, run_id: RunId) -> BusSubscription {
        if self.closed.contains_key(&run_id) {
            return BusSubscription { rx: None };
        }
        BusSubscription {
            rx: Some(self.channel(run_id).tx.subscribe()),
        }
    }

    /// Drop a run's live channel once the run is terminal.
    ///
    /// Subscribers drain what is already buffered and then see
    /// end-of-stream; later subscribers see an ended stream immediately.
    pub fn close_run(&self, run_id: RunId) {
        self.closed.insert(run_id, ());
        if self.channels.remove(&run_id).is_some() {
            debug!(%run_id, "trace channel closed");
        }
    }

    /// Number of live channels.
    #[must_use]
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }
}

/// A live subscription to one run's channel.
pub struct BusSubscription {
    rx: Option<broadcast::Receiver<Arc<TraceEvent>>>,
}

impl BusSubscription {
    /// The next live event.
    ///
    /// `Ok(None)` means the channel closed (run terminal) and the buffer is
    /// drained. [`BusError::Evicted`] means this reader fell behind.
    pub async fn next(&mut self) -> Result<Option<Arc<TraceEvent>>, BusError> {
        let Some(rx) = &mut self.rx else {
            return Ok(None);
        };
        match rx.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            Err(broadcast::error::RecvError::Lagged(missed)) => Err(BusError::Evicted { missed }),
        }
    }
}
