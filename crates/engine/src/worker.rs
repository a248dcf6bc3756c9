//! Worker process host.
//!
//! A worker serves one task queue: it accepts dispatches, tracks the runs
//! it started, and drains them on shutdown — cancel first, terminate
//! whatever outlives the grace window.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::dispatch::RunRequest;
use crate::engine::{Engine, RunHandle};
use crate::error::EngineError;
use crate::settings::WorkerSettings;

/// Hosts runs for one task queue.
pub struct Worker {
    engine: Engine,
    settings: WorkerSettings,
    active: Mutex<Vec<RunHandle>>,
}

impl Worker {
    /// A worker over an engine, configured by `settings`.
    #[must_use]
    pub fn new(engine: Engine, settings: WorkerSettings) -> Self {
        Self {
            engine,
            settings,
            active: Mutex::new(Vec::new()),
        }
    }

    /// The task queue this worker serves.
    #[must_use]
    pub fn task_queue(&self) -> &str {
        &self.settings.task_queue
    }

    /// The namespace this worker runs in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.settings.namespace
    }

    /// Accept one dispatch.
    pub async fn dispatch(&self, request: RunRequest) -> Result<RunHandle, EngineError> {
        info!(
            task_queue = %self.settings.task_queue,
            namespace = %self.settings.namespace,
            workflow = %request.workflow_id,
            "dispatching run"
        );
        let handle = self.engine.submit(request).await?;
        let mut active = self.active.lock();
        active.retain(|h| h.run_id() != handle.run_id());
        active.push(handle.clone());
        Ok(handle)
    }

    /// Runs this worker started that may still be live.
    #[must_use]
    pub fn tracked_runs(&self) -> usize {
        self.active.lock().len()
    }

    /// Drain all runs: cancel, wait for the grace window, terminate
    /// stragglers, and wait for them to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<RunHandle> = self.active.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "worker shutting down, cancelling runs");

        for handle in &handles {
            handle.cancel();
        }
        let grace = self.settings.grace_period;
        for handle in &handles {
            let joined = tokio::time::timeout(grace, handle.join()).await;
            match joined {
                Ok(_) => {}
                Err(_) => {
                    warn!(run_id = %handle.run_id(), "run outlived the grace window, terminating");
                    handle.terminate();
                    let _ = handle.join().await;
                }
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("task_queue", &self.settings.task_queue)
            .field("namespace", &self.settings.namespace)
            .field("tracked_runs", &self.active.lock().len())
            .finish()
    }
}
