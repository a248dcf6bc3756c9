//! The engine: registry + store + bus + runtime, and run lifecycle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use palisade_component::{ArtifactStore, ComponentRegistry, HttpPort, SecretProvider};
use palisade_core::RunId;
use palisade_eventbus::TraceBus;
use palisade_execution::{NewRun, Run};
use palisade_runtime::ActivityRuntime;
use palisade_store::{BlobStore, ExecutionStore, MemoryBlobStore, SpillPolicy};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::dispatch::RunRequest;
use crate::error::EngineError;
use crate::repository::WorkflowRepository;
use crate::scheduler::{ControlSignal, RunScheduler};
use crate::settings::WorkerSettings;

/// Terminal result of one run.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    /// The terminal run record.
    pub run: Run,
    /// Outputs of the run's exit actions, keyed by ref.
    pub outputs: Value,
}

/// Cloneable handle to a live (or finished) run.
#[derive(Clone)]
pub struct RunHandle {
    run_id: RunId,
    control: Arc<watch::Sender<ControlSignal>>,
    done: watch::Receiver<Option<RunCompletion>>,
}

impl RunHandle {
    /// The run this handle controls.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request graceful cancellation.
    pub fn cancel(&self) {
        let _ = self.control.send(ControlSignal::Cancel);
    }

    /// Request abortive termination.
    pub fn terminate(&self) {
        let _ = self.control.send(ControlSignal::Terminate);
    }

    /// Wait for the terminal result.
    pub async fn join(&self) -> Result<RunCompletion, EngineError> {
        let mut done = self.done.clone();
        loop {
            if let Some(completion) = done.borrow_and_update().as_ref() {
                return Ok(completion.clone());
            }
            if done.changed().await.is_err() {
                // The scheduler ended without reporting; surface the loss
                // rather than hanging forever.
                return Err(EngineError::RunLost(self.run_id));
            }
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("finished", &self.done.borrow().is_some())
            .finish()
    }
}

struct EngineShared {
    registry: Arc<ComponentRegistry>,
    repository: Arc<WorkflowRepository>,
    store: Arc<dyn ExecutionStore>,
    bus: Arc<TraceBus>,
    runtime: ActivityRuntime,
    settings: WorkerSettings,
    http: Option<Arc<dyn HttpPort>>,
    secrets: Option<Arc<dyn SecretProvider>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    active: DashMap<RunId, RunHandle>,
}

/// The orchestration engine.
///
/// Cheap to clone; all state is shared. The registry is read-only after
/// construction, the store is the only mutable shared state, and each run's
/// writes go through its single scheduler loop.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    registry: Arc<ComponentRegistry>,
    repository: Arc<WorkflowRepository>,
    store: Arc<dyn ExecutionStore>,
    blob: Arc<dyn BlobStore>,
    settings: WorkerSettings,
    http: Option<Arc<dyn HttpPort>>,
    secrets: Option<Arc<dyn SecretProvider>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
}

impl EngineBuilder {
    /// Attach a blob store for spilled payloads.
    #[must_use]
    pub fn with_blob_store(mut self, blob: Arc<dyn BlobStore>) -> Self {
        self.blob = blob;
        self
    }

    /// Attach the HTTP port handed to activities.
    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpPort>) -> Self {
        self.http = Some(http);
        self
    }

    /// Attach the secret provider handed to activities.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Attach the artifact store handed to activities.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Finish the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        let bus = Arc::new(TraceBus::new(Arc::clone(&self.store)));
        let spill = SpillPolicy::new(self.blob, self.settings.spill_threshold);
        let runtime = ActivityRuntime::new(Arc::clone(&bus), spill);
        Engine {
            shared: Arc::new(EngineShared {
                registry: self.registry,
                repository: self.repository,
                store: self.store,
                bus,
                runtime,
                settings: self.settings,
                http: self.http,
                secrets: self.secrets,
                artifacts: self.artifacts,
                active: DashMap::new(),
            }),
        }
    }
}

impl Engine {
    /// Start building an engine.
    #[must_use]
    pub fn builder(
        registry: Arc<ComponentRegistry>,
        repository: Arc<WorkflowRepository>,
        store: Arc<dyn ExecutionStore>,
        settings: WorkerSettings,
    ) -> EngineBuilder {
        EngineBuilder {
            registry,
            repository,
            store,
            blob: Arc::new(MemoryBlobStore::new()),
            settings,
            http: None,
            secrets: None,
            artifacts: None,
        }
    }

    /// Start a run and return its handle.
    ///
    /// A duplicate idempotency key within the store's window returns the
    /// handle of the existing run instead of starting a new one.
    pub fn submit(
        &self,
        request: RunRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RunHandle, EngineError>> + Send + '_>> {
        Box::pin(self.submit_inner(request))
    }

    async fn submit_inner(&self, request: RunRequest) -> Result<RunHandle, EngineError> {
        let selector = request.selector()?;
        let published = self
            .shared
            .repository
            .resolve(request.workflow_id, &selector)?;

        let new_run = NewRun {
            run_id: request.run_id,
            workflow_id: request.workflow_id,
            workflow_version_id: published.version_id,
            workflow_version: published.version,
            trigger: request.trigger,
            inputs: request.inputs,
            node_overrides: request.node_overrides,
            parent_run_id: request.parent_run_id,
            parent_node_ref: request.parent_node_ref,
            idempotency_key: request.idempotency_key,
            total_actions: published.definition.total_actions(),
        };
        let run = self.shared.store.create_run(new_run).await?;

        // A deduplicated submission maps onto the live (or finished) run.
        if let Some(existing) = self.shared.active.get(&run.run_id) {
            info!(run_id = %run.run_id, "deduplicated submission onto live run");
            return Ok(existing.value().clone());
        }
        if run.status.is_terminal() || run.progress.completed_actions > 0 {
            return Ok(Self::finished_handle(run));
        }

        let (control_tx, control_rx) = watch::channel(ControlSignal::None);
        let (done_tx, done_rx) = watch::channel(None);
        let handle = RunHandle {
            run_id: run.run_id,
            control: Arc::new(control_tx),
            done: done_rx,
        };
        self.shared.active.insert(run.run_id, handle.clone());

        let engine = self.clone();
        let definition = Arc::clone(&published.definition);
        let run_id = run.run_id;
        tokio::spawn(async move {
            let scheduler = RunScheduler::new(engine.clone(), definition, run, control_rx);
            let completion = scheduler.run().await;
            engine.shared.active.remove(&run_id);
            if done_tx.send(Some(completion)).is_err() {
                warn!(%run_id, "no handle left to observe run completion");
            }
        });

        Ok(handle)
    }

    /// A handle for a run that already finished (idempotent resubmission).
    fn finished_handle(run: Run) -> RunHandle {
        let (control_tx, _) = watch::channel(ControlSignal::None);
        let (_, done_rx) = watch::channel(Some(RunCompletion {
            run: run.clone(),
            outputs: Value::Null,
        }));
        RunHandle {
            run_id: run.run_id,
            control: Arc::new(control_tx),
            done: done_rx,
        }
    }

    /// Number of runs currently scheduled on this engine.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.shared.active.len()
    }

    // ── shared access for the scheduler ────────────────────────────────

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.shared.registry
    }

    /// The workflow version repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<WorkflowRepository> {
        &self.shared.repository
    }

    /// The execution store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.shared.store
    }

    /// The trace bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<TraceBus> {
        &self.shared.bus
    }

    /// The activity runtime.
    #[must_use]
    pub fn runtime(&self) -> &ActivityRuntime {
        &self.shared.runtime
    }

    /// The worker settings.
    #[must_use]
    pub fn settings(&self) -> &WorkerSettings {
        &self.shared.settings
    }

    pub(crate) fn http(&self) -> Option<Arc<dyn HttpPort>> {
        self.shared.http.clone()
    }

    pub(crate) fn secrets(&self) -> Option<Arc<dyn SecretProvider>> {
        self.shared.secrets.clone()
    }

    pub(crate) fn artifacts(&self) -> Option<Arc<dyn ArtifactStore>> {
        self.shared.artifacts.clone()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("task_queue", &self.shared.settings.task_queue)
            .field("components", &self.shared.registry.len())
            .field("active_runs", &self.shared.active.len())
            .finish()
    }
}
