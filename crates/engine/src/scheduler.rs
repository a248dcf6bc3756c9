//! The per-run scheduler loop.
//!
//! One run is one single-threaded loop (the only writer of run state) plus
//! a set of parallel activity tasks. The loop owns the dependency counters,
//! routes edges by outcome, applies join strategies, propagates skips,
//! persists progress after every transition, and services cancel /
//! terminate / timeout signals.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use palisade_component::builtin::SUBWORKFLOW_COMPONENT_ID;
use palisade_component::{Component, ComponentError};
use palisade_core::{ErrorKind, NodeRef, WorkflowId};
use palisade_execution::{
    ActionState, NodeIoRecord, Run, RunFailure, RunStatus, TraceError, TraceEvent, TraceMetadata,
};
use palisade_runtime::{ActivityOutcome, ActivityRequest, RuntimeError, route_inputs};
use palisade_store::ExecutionStore;
use palisade_workflow::{ActionDefinition, EdgeKind, JoinStrategy, WorkflowDefinition};
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::RunRequest;
use crate::engine::{Engine, RunCompletion};

/// External control applied to a running run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ControlSignal {
    /// Keep running.
    #[default]
    None,
    /// Graceful stop: drain in-flight activities within the grace window.
    Cancel,
    /// Abortive stop: cut in-flight activities off after the grace window.
    Terminate,
}

/// How one resolved action fires its outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOutcome {
    /// Success edges fire; failure edges resolve non-matching.
    Success,
    /// Failure edges fire; success edges resolve non-matching.
    Failure,
    /// Treated as a completion with no output: success edges fire.
    Skip,
}

impl EdgeOutcome {
    fn fires(self, kind: EdgeKind) -> bool {
        match self {
            Self::Success | Self::Skip => kind == EdgeKind::Success,
            Self::Failure => kind == EdgeKind::Failure,
        }
    }
}

/// Scheduler-side state of one action.
struct ActionSlot {
    state: ActionState,
    remaining: usize,
    matched: bool,
    triggered_by: Option<NodeRef>,
    token: CancellationToken,
    outputs: Option<Value>,
}

type ActivityResult = (NodeRef, Result<ActivityOutcome, RuntimeError>);

/// The single writer of one run's state.
pub(crate) struct RunScheduler {
    engine: Engine,
    definition: Arc<WorkflowDefinition>,
    run: Run,
    control: watch::Receiver<ControlSignal>,
    slots: HashMap<NodeRef, ActionSlot>,
    ready: VecDeque<NodeRef>,
    inflight: usize,
    unresolved: usize,
    run_token: CancellationToken,
    control_open: bool,
    failure: Option<RunFailure>,
    exit_outputs: Map<String, Value>,
}

impl RunScheduler {
    pub(crate) fn new(
        engine: Engine,
        definition: Arc<WorkflowDefinition>,
        run: Run,
        control: watch::Receiver<ControlSignal>,
    ) -> Self {
        let run_token = CancellationToken::new();
        let mut slots = HashMap::with_capacity(definition.actions.len());
        for action in &definition.actions {
            slots.insert(action.node_ref.clone(), ActionSlot {
                state: ActionState::Waiting,
                remaining: action.dependency_count(),
                matched: action.dependency_count() == 0,
                triggered_by: None,
                token: run_token.child_token(),
                outputs: None,
            });
        }
        let unresolved = definition.actions.len();

        Self {
            engine,
            definition,
            run,
            control,
            slots,
            ready: VecDeque::new(),
            inflight: 0,
            unresolved,
            run_token,
            control_open: true,
            failure: None,
            exit_outputs: Map::new(),
        }
    }

    /// Drive the run to a terminal state.
    pub(crate) async fn run(mut self) -> RunCompletion {
        let run_id = self.run.run_id;
        info!(%run_id, workflow = %self.run.workflow_id, "run starting");

        if let Err(error) = self.persist_status(RunStatus::Running, None).await {
            error!(%run_id, %error, "failed to persist RUNNING, abandoning run");
            return self.complete();
        }

        // Seed: everything without dependencies is immediately ready.
        let roots: Vec<NodeRef> = self
            .definition
            .actions
            .iter()
            .filter(|a| a.dependency_count() == 0)
            .map(|a| a.node_ref.clone())
            .collect();
        for root in roots {
            self.make_ready(root);
        }

        let mut activities: JoinSet<ActivityResult> = JoinSet::new();
        let deadline = tokio::time::sleep(
            self.engine
                .settings()
                .run_timeout
                .unwrap_or(Duration::from_secs(u64::from(u32::MAX))),
        );
        tokio::pin!(deadline);
        let timeout_enabled = self.engine.settings().run_timeout.is_some();

        enum LoopEvent {
            Control { closed: bool },
            Deadline,
            Joined(Option<Result<ActivityResult, tokio::task::JoinError>>),
        }

        loop {
            self.dispatch_ready(&mut activities).await;

            if self.unresolved == 0 && self.inflight == 0 {
                break;
            }
            if self.inflight == 0 && self.ready.is_empty() && self.unresolved > 0 {
                // The compiler rejects cycles, so this is unreachable unless
                // the scheduler itself is wrong.
                error!(%run_id, unresolved = self.unresolved, "scheduler wedged with no work");
                self.failure = Some(RunFailure {
                    reason: "scheduler observed inflight=0, ready=∅, unresolved>0".into(),
                    kind: Some(ErrorKind::Internal),
                    details: None,
                });
                self.abort_run(&mut activities, false).await;
                break;
            }

            let event = tokio::select! {
                biased;
                changed = self.control.changed(), if self.control_open => LoopEvent::Control {
                    closed: changed.is_err(),
                },
                () = &mut deadline, if timeout_enabled => LoopEvent::Deadline,
                joined = activities.join_next(), if self.inflight > 0 => {
                    LoopEvent::Joined(joined)
                }
            };

            match event {
                LoopEvent::Control { closed } => {
                    let signal = if closed {
                        self.control_open = false;
                        ControlSignal::None
                    } else {
                        *self.control.borrow()
                    };
                    match signal {
                        ControlSignal::Cancel => {
                            info!(%run_id, "cancel requested");
                            self.abort_run(&mut activities, false).await;
                            self.finish_with(RunStatus::Cancelled).await;
                            return self.complete();
                        }
                        ControlSignal::Terminate => {
                            info!(%run_id, "terminate requested");
                            self.abort_run(&mut activities, true).await;
                            self.finish_with(RunStatus::Terminated).await;
                            return self.complete();
                        }
                        ControlSignal::None => {}
                    }
                }
                LoopEvent::Deadline => {
                    warn!(%run_id, "run deadline expired");
                    self.failure = Some(RunFailure {
                        reason: "run exceeded its configured deadline".into(),
                        kind: Some(ErrorKind::Timeout),
                        details: None,
                    });
                    self.abort_run(&mut activities, false).await;
                    self.finish_with(RunStatus::TimedOut).await;
                    return self.complete();
                }
                LoopEvent::Joined(Some(joined)) => {
                    self.handle_joined(joined, &mut activities).await;
                }
                LoopEvent::Joined(None) => {
                    // The set is empty; realign the counter with reality.
                    self.inflight = 0;
                }
            }
        }

        let status = if self.failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.finish_with(status).await;
        self.complete()
    }

    fn complete(self) -> RunCompletion {
        RunCompletion {
            run: self.run,
            outputs: Value::Object(self.exit_outputs),
        }
    }

    // ── readiness and dispatch ──────────────────────────────────────────

    fn make_ready(&mut self, node_ref: NodeRef) {
        if let Some(slot) = self.slots.get_mut(&node_ref) {
            if slot.state == ActionState::Waiting {
                slot.state = ActionState::Ready;
                self.ready.push_back(node_ref);
            }
        }
    }

    async fn dispatch_ready(&mut self, activities: &mut JoinSet<ActivityResult>) {
        let cap = self
            .engine
            .settings()
            .max_concurrency
            .unwrap_or(usize::MAX);
        while self.inflight < cap {
            let Some(node_ref) = self.ready.pop_front() else {
                break;
            };
            self.dispatch(node_ref, activities).await;
        }
    }

    async fn dispatch(&mut self, node_ref: NodeRef, activities: &mut JoinSet<ActivityResult>) {
        let Some(action) = self.definition.action(&node_ref).cloned() else {
            return;
        };
        let Some(slot) = self.slots.get_mut(&node_ref) else {
            return;
        };
        slot.state = ActionState::Running;
        self.inflight += 1;

        let upstream: HashMap<NodeRef, Value> = action
            .depends_on
            .iter()
            .filter_map(|dep| {
                self.slots
                    .get(dep)
                    .and_then(|slot| slot.outputs.clone())
                    .map(|outputs| (dep.clone(), outputs))
            })
            .collect();
        let triggered_by = self
            .slots
            .get(&node_ref)
            .and_then(|slot| slot.triggered_by.as_ref())
            .map(ToString::to_string);
        let token = self
            .slots
            .get(&node_ref)
            .map_or_else(CancellationToken::new, |slot| slot.token.clone());

        debug!(run_id = %self.run.run_id, node = %node_ref, "dispatching action");

        if action.component_id == SUBWORKFLOW_COMPONENT_ID {
            let call = SubworkflowCall {
                engine: self.engine.clone(),
                parent: self.run.clone(),
                action: action.clone(),
                upstream,
                manual_inputs: self.manual_inputs_for(&node_ref),
                param_overrides: self.param_overrides_for(&node_ref),
                token,
            };
            activities.spawn(async move {
                let node_ref = call.action.node_ref.clone();
                let result = call.run().await;
                (node_ref, Ok(ActivityOutcome { result, attempts: 1 }))
            });
            return;
        }

        let Some(component) = self.engine.registry().get(&action.component_id) else {
            // The compiler resolved this id; losing it now is fatal.
            self.inflight -= 1;
            self.fail_run(
                ComponentError::internal(format!(
                    "component `{}` vanished from the registry",
                    action.component_id
                )),
                activities,
            )
            .await;
            return;
        };

        let seed_inputs = (node_ref == self.definition.entrypoint.node_ref)
            .then(|| self.run.inputs.clone());
        let request = ActivityRequest {
            run_id: self.run.run_id,
            action: action.clone(),
            component,
            upstream,
            manual_inputs: self.manual_inputs_for(&node_ref),
            param_overrides: self.param_overrides_for(&node_ref),
            seed_inputs,
            cancellation: token,
            triggered_by,
            http: self.engine.http(),
            secrets: self.engine.secrets(),
            artifacts: self.engine.artifacts(),
        };
        let runtime = self.engine.runtime().clone();
        activities.spawn(async move {
            let outcome = runtime.execute(request).await;
            (action.node_ref, outcome)
        });
    }

    /// Node-pinned input overrides overlaid with run-level overrides.
    fn manual_inputs_for(&self, node_ref: &NodeRef) -> Map<String, Value> {
        let mut manual = self
            .definition
            .nodes
            .iter()
            .find(|n| &n.id == node_ref)
            .map(|n| n.data.config.input_overrides.clone())
            .unwrap_or_default();
        if let Some(run_override) = self.run.override_for(node_ref) {
            for (key, value) in &run_override.input_overrides {
                manual.insert(key.clone(), value.clone());
            }
        }
        manual
    }

    fn param_overrides_for(&self, node_ref: &NodeRef) -> Map<String, Value> {
        self.run
            .override_for(node_ref)
            .map(|o| o.params.clone())
            .unwrap_or_default()
    }

    // ── completion handling ─────────────────────────────────────────────

    async fn handle_joined(
        &mut self,
        joined: Result<ActivityResult, tokio::task::JoinError>,
        activities: &mut JoinSet<ActivityResult>,
    ) {
        self.inflight = self.inflight.saturating_sub(1);
        match joined {
            Ok((node_ref, Ok(outcome))) => {
                self.handle_outcome(node_ref, outcome, activities).await;
            }
            Ok((node_ref, Err(runtime_error))) => {
                error!(node = %node_ref, %runtime_error, "activity infrastructure failure");
                self.fail_run(
                    ComponentError::internal(format!(
                        "activity infrastructure failure at `{node_ref}`: {runtime_error}"
                    )),
                    activities,
                )
                .await;
            }
            Err(join_error) => {
                error!(%join_error, "activity task aborted or panicked");
                if join_error.is_panic() {
                    self.fail_run(
                        ComponentError::internal("activity task panicked"),
                        activities,
                    )
                    .await;
                }
            }
        }
    }

    async fn handle_outcome(
        &mut self,
        node_ref: NodeRef,
        outcome: ActivityOutcome,
        activities: &mut JoinSet<ActivityResult>,
    ) {
        match outcome.result {
            Ok(outputs) => {
                self.mark_terminal(&node_ref, ActionState::Succeeded, Some(outputs))
                    .await;
                self.resolve_edges(node_ref, EdgeOutcome::Success).await;
            }
            Err(error) if error.kind == ErrorKind::Cancelled => {
                // Either the run is shutting down, or a `first` join
                // cancelled this peer. Neither fails the run here.
                debug!(node = %node_ref, "activity cancelled");
                self.mark_terminal(&node_ref, ActionState::Failed, None).await;
                self.resolve_edges(node_ref, EdgeOutcome::Failure).await;
            }
            Err(error) => {
                let routed = self
                    .definition
                    .action(&node_ref)
                    .is_some_and(ActionDefinition::has_failure_route);
                if routed {
                    debug!(node = %node_ref, %error, "failure routed through failure edge");
                    self.mark_terminal(&node_ref, ActionState::Failed, None).await;
                    self.resolve_edges(node_ref, EdgeOutcome::Failure).await;
                } else {
                    self.fail_run(error, activities).await;
                }
            }
        }
    }

    async fn mark_terminal(
        &mut self,
        node_ref: &NodeRef,
        state: ActionState,
        outputs: Option<Value>,
    ) {
        if let Some(slot) = self.slots.get_mut(node_ref) {
            if slot.state.is_terminal() {
                return;
            }
            slot.state = state;
            slot.outputs.clone_from(&outputs);
        }
        self.unresolved = self.unresolved.saturating_sub(1);
        self.run.record_action_completion();
        if state == ActionState::Succeeded {
            if let Some(outputs) = outputs {
                if self
                    .definition
                    .action(node_ref)
                    .is_some_and(|a| a.routes_of(EdgeKind::Success).next().is_none())
                {
                    self.exit_outputs.insert(node_ref.to_string(), outputs);
                }
            }
        }
        if let Err(error) = self
            .engine
            .store()
            .update_progress(self.run.run_id, self.run.progress)
            .await
        {
            warn!(%error, "failed to persist progress");
        }
    }

    /// Resolve the outgoing edges of a terminal action, cascading skips.
    async fn resolve_edges(&mut self, origin: NodeRef, outcome: EdgeOutcome) {
        let mut queue: VecDeque<(NodeRef, EdgeOutcome)> = VecDeque::new();
        queue.push_back((origin, outcome));

        while let Some((pred, outcome)) = queue.pop_front() {
            let Some(action) = self.definition.action(&pred) else {
                continue;
            };

            // Parallel edges to one target count as a single dependency;
            // the target matches if any of them fires.
            let mut targets: Vec<(NodeRef, bool)> = Vec::new();
            for route in &action.edge_kinds {
                let fires = outcome.fires(route.kind);
                match targets.iter_mut().find(|(t, _)| t == &route.to_ref) {
                    Some((_, matched)) => *matched |= fires,
                    None => targets.push((route.to_ref.clone(), fires)),
                }
            }

            for (target, fired) in targets {
                let Some(join) = self.definition.action(&target).map(|a| a.join_strategy) else {
                    continue;
                };
                let (remaining, matched, state) = {
                    let Some(slot) = self.slots.get_mut(&target) else {
                        continue;
                    };
                    slot.remaining = slot.remaining.saturating_sub(1);
                    if fired {
                        slot.matched = true;
                        if slot.triggered_by.is_none() {
                            slot.triggered_by = Some(pred.clone());
                        }
                    }
                    (slot.remaining, slot.matched, slot.state)
                };
                if state != ActionState::Waiting {
                    continue;
                }

                // `any`/`first` dispatch on the first predecessor success;
                // a fired failure edge resolves normally via the counter.
                let early_join = fired
                    && outcome != EdgeOutcome::Failure
                    && matches!(join, JoinStrategy::Any | JoinStrategy::First);
                if early_join {
                    self.make_ready(target.clone());
                    if join == JoinStrategy::First {
                        self.cancel_join_peers(&target);
                    }
                    continue;
                }

                if remaining == 0 {
                    if matched {
                        self.make_ready(target);
                    } else {
                        self.skip_action(&target).await;
                        queue.push_back((target, EdgeOutcome::Skip));
                    }
                }
            }
        }
    }

    /// Cancel still-running predecessors of a `first` join target.
    fn cancel_join_peers(&self, target: &NodeRef) {
        let Some(action) = self.definition.action(target) else {
            return;
        };
        for peer in &action.depends_on {
            if let Some(slot) = self.slots.get(peer) {
                if slot.state == ActionState::Running {
                    debug!(join = %target, peer = %peer, "cancelling join peer");
                    slot.token.cancel();
                }
            }
        }
    }

    async fn skip_action(&mut self, node_ref: &NodeRef) {
        debug!(node = %node_ref, "skipping action with no matching inbound edge");
        if let Err(error) = self
            .engine
            .store()
            .upsert_node_io(self.run.run_id, node_ref.clone(), 1, NodeIoRecord::skipped())
            .await
        {
            warn!(%error, "failed to persist skip record");
        }
        self.mark_terminal(node_ref, ActionState::Skipped, None).await;
    }

    // ── failure, cancellation, timeout ──────────────────────────────────

    /// Unrouted action failure: record it and stop the run.
    async fn fail_run(
        &mut self,
        error: ComponentError,
        activities: &mut JoinSet<ActivityResult>,
    ) {
        if self.failure.is_none() {
            self.failure = Some(RunFailure {
                reason: error.message.clone(),
                kind: Some(error.kind),
                details: error.details.clone(),
            });
        }
        self.abort_run(activities, false).await;
        self.finish_with(RunStatus::Failed).await;
    }

    /// Cancel in-flight work: cooperatively within the grace window, then
    /// abortively. `hard` skips the cooperative phase (terminate).
    async fn abort_run(&mut self, activities: &mut JoinSet<ActivityResult>, hard: bool) {
        self.run_token.cancel();
        self.ready.clear();

        if !hard {
            let grace = self.engine.settings().grace_period;
            let drained = tokio::time::timeout(grace, async {
                while let Some(joined) = activities.join_next().await {
                    self.inflight = self.inflight.saturating_sub(1);
                    if let Ok((node_ref, Ok(outcome))) = joined {
                        // Persisted events/records already happened inside
                        // the activity; just account for the terminal state.
                        let state = if outcome.is_success() {
                            ActionState::Succeeded
                        } else {
                            ActionState::Failed
                        };
                        let outputs = outcome.result.ok();
                        self.mark_terminal(&node_ref, state, outputs).await;
                    }
                }
            })
            .await;
            if drained.is_ok() {
                return;
            }
            warn!(run_id = %self.run.run_id, "grace window expired, aborting stragglers");
        }

        activities.abort_all();
        while let Some(joined) = activities.join_next().await {
            self.inflight = self.inflight.saturating_sub(1);
            // A task that finished before the abort landed has already
            // written its own record and terminal event — account for it so
            // it is not treated as cut off below.
            if let Ok((node_ref, Ok(outcome))) = joined {
                let state = if outcome.is_success() {
                    ActionState::Succeeded
                } else {
                    ActionState::Failed
                };
                let outputs = outcome.result.ok();
                self.mark_terminal(&node_ref, state, outputs).await;
            }
        }

        // Anything still marked running was cut off before it could write
        // its own terminal record.
        let cut_off: Vec<NodeRef> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.state == ActionState::Running)
            .map(|(node_ref, _)| node_ref.clone())
            .collect();
        for node_ref in cut_off {
            let error = ComponentError::cancelled();
            let mut record = NodeIoRecord::running();
            record.fail(error.message.clone(), error.kind);
            if let Err(store_error) = self
                .engine
                .store()
                .upsert_node_io(self.run.run_id, node_ref.clone(), 1, record)
                .await
            {
                warn!(%store_error, "failed to persist cut-off record");
            }
            let mut event = TraceEvent::failed(self.run.run_id, node_ref.clone(), 1, TraceError {
                message: error.message.clone(),
                kind: error.kind,
                details: None,
            });
            event.metadata = TraceMetadata::default();
            if let Err(bus_error) = self.engine.bus().publish(self.run.run_id, vec![event]).await {
                warn!(%bus_error, "failed to publish cut-off event");
            }
            self.mark_terminal(&node_ref, ActionState::Failed, None).await;
        }
    }

    /// Mark every unresolved action skipped so progress reaches total, then
    /// persist the terminal status.
    async fn finish_with(&mut self, status: RunStatus) {
        if self.run.status.is_terminal() {
            return;
        }

        let leftovers: Vec<NodeRef> = self
            .slots
            .iter()
            .filter(|(_, slot)| !slot.state.is_terminal())
            .map(|(node_ref, _)| node_ref.clone())
            .collect();
        for node_ref in leftovers {
            self.skip_action(&node_ref).await;
        }

        if let Err(error) = self.persist_status(status, self.failure.clone()).await {
            error!(%error, "failed to persist terminal status");
        }
        self.engine.bus().close_run(self.run.run_id);
        info!(run_id = %self.run.run_id, %status, "run finished");
    }

    async fn persist_status(
        &mut self,
        status: RunStatus,
        failure: Option<RunFailure>,
    ) -> Result<(), crate::error::EngineError> {
        if let Some(failure) = &failure {
            self.run.set_failure(failure.clone());
        }
        if let Err(error) = self.run.transition(status) {
            warn!(%error, "local run transition rejected");
        }
        self.engine
            .store()
            .update_progress(self.run.run_id, self.run.progress)
            .await?;
        self.engine
            .store()
            .update_run_status(self.run.run_id, status, failure)
            .await?;
        Ok(())
    }
}

// ── sub-workflow call ───────────────────────────────────────────────────

/// One `core.workflow.call` dispatch, executed by the orchestrator.
struct SubworkflowCall {
    engine: Engine,
    parent: Run,
    action: ActionDefinition,
    upstream: HashMap<NodeRef, Value>,
    manual_inputs: Map<String, Value>,
    param_overrides: Map<String, Value>,
    token: CancellationToken,
}

impl SubworkflowCall {
    async fn run(self) -> Result<Value, ComponentError> {
        let run_id = self.parent.run_id;
        let node_ref = self.action.node_ref.clone();

        let publish = |event: TraceEvent| {
            let bus = Arc::clone(self.engine.bus());
            async move {
                if let Err(error) = bus.publish(run_id, vec![event]).await {
                    warn!(%error, "failed to publish sub-workflow event");
                }
            }
        };

        publish(TraceEvent::started(run_id, node_ref.clone(), 1)).await;
        let started_record = NodeIoRecord::running();
        let _ = self
            .engine
            .store()
            .upsert_node_io(run_id, node_ref.clone(), 1, started_record)
            .await;

        match self.invoke().await {
            Ok(outputs) => {
                let mut record = NodeIoRecord::running();
                record.complete(
                    palisade_execution::Payload::inline(outputs.clone()),
                    serde_json::to_vec(&outputs).map(|b| b.len() as u64).unwrap_or(0),
                );
                let _ = self
                    .engine
                    .store()
                    .upsert_node_io(run_id, node_ref.clone(), 1, record)
                    .await;
                publish(TraceEvent::completed(
                    run_id,
                    node_ref.clone(),
                    1,
                    palisade_execution::summarize_output(&outputs),
                ))
                .await;
                Ok(outputs)
            }
            Err(error) => {
                let mut record = NodeIoRecord::running();
                record.fail(error.message.clone(), error.kind);
                let _ = self
                    .engine
                    .store()
                    .upsert_node_io(run_id, node_ref.clone(), 1, record)
                    .await;
                publish(TraceEvent::failed(run_id, node_ref.clone(), 1, TraceError {
                    message: error.message.clone(),
                    kind: error.kind,
                    details: error.details.clone(),
                }))
                .await;
                Err(error)
            }
        }
    }

    async fn invoke(&self) -> Result<Value, ComponentError> {
        let params = palisade_runtime::routing::merge_params(
            &self.action.params,
            &self.param_overrides,
        );
        let workflow_id = params
            .get("workflow_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::configuration("sub-workflow call requires a `workflow_id` param")
            })?;
        let workflow_id = WorkflowId::parse(workflow_id).map_err(|_| {
            ComponentError::configuration(format!("`{workflow_id}` is not a workflow id"))
        })?;

        let strategy = params
            .get("version_strategy")
            .and_then(Value::as_str)
            .unwrap_or("latest");
        let version_id = match strategy {
            "latest" => None,
            "specific" => {
                let raw = params.get("version_id").and_then(Value::as_str).ok_or_else(|| {
                    ComponentError::configuration(
                        "version strategy `specific` requires `version_id`",
                    )
                })?;
                Some(
                    palisade_core::WorkflowVersionId::parse(raw).map_err(|_| {
                        ComponentError::configuration(format!("`{raw}` is not a version id"))
                    })?,
                )
            }
            other => {
                return Err(ComponentError::configuration(format!(
                    "unknown version strategy `{other}`"
                )));
            }
        };

        // Forward the node's routed runtime inputs as the child's inputs.
        let component = self
            .engine
            .registry()
            .get(&self.action.component_id)
            .ok_or_else(|| ComponentError::internal("sub-workflow component unregistered"))?;
        let routed = route_inputs(
            &component.definition().inputs,
            &self.action.input_mappings,
            &self.upstream,
            &self.manual_inputs,
        )?;
        // A single object on the `in` port IS the child's input map; any
        // other shape forwards the routed ports verbatim.
        let child_inputs = match routed.values.get("in") {
            Some(Value::Object(map)) if routed.values.len() == 1 => map.clone(),
            _ => routed.values,
        };

        let request = RunRequest {
            workflow_id,
            version_id,
            inputs: child_inputs,
            trigger: self.parent.trigger.clone(),
            parent_run_id: Some(self.parent.run_id),
            parent_node_ref: Some(self.action.node_ref.clone()),
            ..RunRequest::default()
        };

        let handle = self.engine.submit(request).await.map_err(|error| {
            ComponentError::not_found(format!("cannot start sub-workflow: {error}"))
        })?;

        let completion = tokio::select! {
            completion = handle.join() => completion,
            () = self.token.cancelled() => {
                handle.cancel();
                let completion = handle.join().await;
                drop(completion);
                return Err(ComponentError::cancelled());
            }
        };
        let completion =
            completion.map_err(|error| ComponentError::internal(error.to_string()))?;

        if completion.run.status == RunStatus::Completed {
            Ok(json!({ "out": completion.outputs }))
        } else {
            let failure = completion.run.failure;
            Err(ComponentError::new(
                failure
                    .as_ref()
                    .and_then(|f| f.kind)
                    .unwrap_or(ErrorKind::Internal),
                failure.map_or_else(
                    || format!("sub-workflow ended {}", completion.run.status),
                    |f| f.reason,
                ),
            ))
        }
    }
}
