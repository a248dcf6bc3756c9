//! The activity attempt loop.
//!
//! One [`ActivityRequest`] is one action dispatch: the runtime resolves
//! effective ports, routes and coerces inputs, invokes the runner with the
//! component's timeout, persists node I/O (spilling large payloads), emits
//! the `STARTED`/`PROGRESS`/`COMPLETED`/`FAILED` trace sequence and
//! enforces the retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use palisade_component::{
    ActivityContext, ArtifactStore, Component, ComponentError, ExecuteRequest, HttpPort,
    ProgressSink, SecretProvider,
};
use palisade_core::{ErrorKind, EventLevel, NodeRef, RunId};
use palisade_eventbus::TraceBus;
use palisade_execution::{
    NodeIoRecord, TraceError, TraceEvent, TraceMetadata, summarize_output,
};
use palisade_store::{ExecutionStore, SpillPolicy};
use palisade_workflow::ActionDefinition;
use palisade_ports::{CoercionOutcome, PortSet, coerce};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::RuntimeError;
use crate::routing::{merge_params, route_inputs};
use crate::runner;
use crate::support::TracingLogger;

/// Everything one activity dispatch needs.
pub struct ActivityRequest {
    /// The run this dispatch belongs to.
    pub run_id: RunId,
    /// The compiled action.
    pub action: ActionDefinition,
    /// The component implementation.
    pub component: Arc<dyn Component>,
    /// Outputs of resolved predecessors, keyed by their ref.
    pub upstream: HashMap<NodeRef, Value>,
    /// Manual input values: node-pinned overrides overlaid with run-level
    /// overrides (run wins).
    pub manual_inputs: Map<String, Value>,
    /// Run-level param overrides for this node.
    pub param_overrides: Map<String, Value>,
    /// When set, routing is bypassed and these become the inputs verbatim
    /// (the entrypoint's trigger inputs).
    pub seed_inputs: Option<Map<String, Value>>,
    /// Cancellation scope for this action.
    pub cancellation: CancellationToken,
    /// What caused the dispatch, for trace metadata.
    pub triggered_by: Option<String>,
    /// HTTP port wired into the context.
    pub http: Option<Arc<dyn HttpPort>>,
    /// Secret provider wired into the context.
    pub secrets: Option<Arc<dyn SecretProvider>>,
    /// Artifact store wired into the context.
    pub artifacts: Option<Arc<dyn ArtifactStore>>,
}

/// Outcome of one activity dispatch.
#[derive(Debug)]
pub struct ActivityOutcome {
    /// Success with outputs, or the final classified failure.
    pub result: Result<Value, ComponentError>,
    /// Attempts consumed (1-based count).
    pub attempts: u32,
}

impl ActivityOutcome {
    /// Returns `true` if the activity succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Executes activities against the bus and store.
#[derive(Clone)]
pub struct ActivityRuntime {
    bus: Arc<TraceBus>,
    spill: SpillPolicy,
}

impl ActivityRuntime {
    /// A runtime publishing through `bus` and spilling through `spill`.
    #[must_use]
    pub fn new(bus: Arc<TraceBus>, spill: SpillPolicy) -> Self {
        Self { bus, spill }
    }

    /// Run one activity to its final outcome, retries included.
    #[instrument(skip_all, fields(run_id = %request.run_id, node_ref = %request.action.node_ref))]
    pub async fn execute(&self, request: ActivityRequest) -> Result<ActivityOutcome, RuntimeError> {
        let definition = request.component.definition();
        let policy = definition.retry_policy.clone();
        let params = merge_params(&request.action.params, &request.param_overrides);
        let runner_spec = definition.runner.clone();
        let timeout = runner_spec.timeout();

        // Effective schemas come from `resolve_ports` when the component
        // defines it — the compiler used the same hook, so both sides agree.
        let (effective_inputs, effective_outputs) =
            match request.component.resolve_ports(&params) {
                Some(ports) => (ports.inputs, ports.outputs),
                None => (definition.inputs.clone(), definition.outputs.clone()),
            };

        let mut attempt: u32 = 1;
        loop {
            let outcome = self
                .run_attempt(
                    &request,
                    &params,
                    &effective_inputs,
                    &effective_outputs,
                    &runner_spec,
                    timeout,
                    attempt,
                    &policy,
                )
                .await?;

            match outcome {
                Ok(outputs) => {
                    return Ok(ActivityOutcome {
                        result: Ok(outputs),
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    let cancelled = error.kind == ErrorKind::Cancelled;
                    if !cancelled && policy.should_retry(error.kind, attempt) {
                        let delay = policy.delay_after(attempt);
                        debug!(%error, attempt, ?delay, "retrying after backoff");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(ActivityOutcome {
                        result: Err(error),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// One attempt: trace STARTED, route, dispatch, persist, trace terminal.
    #[allow(clippy::too_many_arguments)]
    async fn run_attempt(
        &self,
        request: &ActivityRequest,
        params: &Map<String, Value>,
        effective_inputs: &PortSet,
        effective_outputs: &PortSet,
        runner_spec: &palisade_component::RunnerSpec,
        timeout: Option<std::time::Duration>,
        attempt: u32,
        policy: &palisade_component::RetryPolicy,
    ) -> Result<Result<Value, ComponentError>, RuntimeError> {
        let run_id = request.run_id;
        let node_ref = request.action.node_ref.clone();

        let (sink, mut progress_rx) = ProgressSink::channel();
        let ctx = ActivityContext::new(run_id, node_ref.clone(), attempt)
            .with_cancellation(request.cancellation.child_token())
            .with_progress(sink)
            .with_logger(Arc::new(TracingLogger));
        let ctx = match &request.http {
            Some(http) => ctx.with_http(Arc::clone(http)),
            None => ctx,
        };
        let ctx = match &request.secrets {
            Some(secrets) => ctx.with_secrets(Arc::clone(secrets)),
            None => ctx,
        };
        let ctx = match &request.artifacts {
            Some(artifacts) => ctx.with_artifacts(Arc::clone(artifacts)),
            None => ctx,
        };

        let metadata = self.metadata_for(request, &ctx, attempt, policy);
        self.bus
            .publish(run_id, vec![
                TraceEvent::started(run_id, node_ref.clone(), attempt)
                    .with_metadata(metadata.clone()),
            ])
            .await?;

        // Routing happens inside the attempt so trace order is
        // STARTED → FAILED even for validation failures.
        let routed = match &request.seed_inputs {
            Some(seed) => Ok(crate::routing::RoutedInputs {
                values: seed.clone(),
                warnings: Vec::new(),
            }),
            None => route_inputs(
                effective_inputs,
                &request.action.input_mappings,
                &request.upstream,
                &request.manual_inputs,
            ),
        };

        let routed = match routed {
            Ok(routed) => routed,
            Err(error) => {
                let mut record = NodeIoRecord::running();
                record.fail(error.message.clone(), error.kind);
                self.persist_record(run_id, &node_ref, attempt, record).await?;
                self.publish_failure(run_id, &node_ref, attempt, &error, &metadata)
                    .await?;
                return Ok(Err(error));
            }
        };

        for warning in &routed.warnings {
            self.bus
                .publish(run_id, vec![
                    TraceEvent::progress(run_id, node_ref.clone(), EventLevel::Warn, warning)
                        .with_metadata(metadata.clone()),
                ])
                .await?;
        }

        let (inputs_payload, inputs_size) = self
            .spill
            .store(
                run_id,
                &node_ref,
                attempt,
                "inputs",
                &Value::Object(routed.values.clone()),
            )
            .await?;
        self.persist_record(
            run_id,
            &node_ref,
            attempt,
            NodeIoRecord::running().with_inputs(inputs_payload.clone(), inputs_size),
        )
        .await?;

        // Forward live progress while the runner executes.
        let bus = Arc::clone(&self.bus);
        let progress_node = node_ref.clone();
        let progress_metadata = metadata.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                let trace = TraceEvent::progress(
                    run_id,
                    progress_node.clone(),
                    event.level,
                    event.message,
                )
                .with_metadata(progress_metadata.clone());
                let trace = match event.data {
                    Some(data) => trace.with_data(data),
                    None => trace,
                };
                if let Err(error) = bus.publish(run_id, vec![trace]).await {
                    warn!(%error, "dropping progress forwarding after bus failure");
                    break;
                }
            }
        });

        let execute_request = ExecuteRequest::new(routed.values, params.clone());
        let dispatched = runner::dispatch(
            request.component.as_ref(),
            runner_spec,
            execute_request,
            &ctx,
        );
        let cancellation = ctx.cancellation.clone();
        let raw_outcome = async {
            tokio::select! {
                outcome = dispatched => outcome,
                () = cancellation.cancelled() => Err(ComponentError::cancelled()),
            }
        };
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, raw_outcome).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ComponentError::timeout(format!(
                    "attempt exceeded {}s",
                    limit.as_secs()
                ))),
            },
            None => raw_outcome.await,
        };

        // The context owns the only remaining sink; dropping it ends the
        // forwarder after the queue drains, so no PROGRESS can follow the
        // terminal event.
        drop(ctx);
        let _ = forwarder.await;

        match outcome {
            Ok(outputs) => {
                let outputs = match validate_outputs(outputs, effective_outputs) {
                    Ok(outputs) => outputs,
                    Err(error) => {
                        let mut record = NodeIoRecord::running()
                            .with_inputs(inputs_payload, inputs_size);
                        record.fail(error.message.clone(), error.kind);
                        self.persist_record(run_id, &node_ref, attempt, record).await?;
                        self.publish_failure(run_id, &node_ref, attempt, &error, &metadata)
                            .await?;
                        return Ok(Err(error));
                    }
                };

                let (outputs_payload, outputs_size) = self
                    .spill
                    .store(run_id, &node_ref, attempt, "outputs", &outputs)
                    .await?;
                let mut record =
                    NodeIoRecord::running().with_inputs(inputs_payload, inputs_size);
                record.complete(outputs_payload, outputs_size);
                self.persist_record(run_id, &node_ref, attempt, record).await?;

                self.bus
                    .publish(run_id, vec![
                        TraceEvent::completed(
                            run_id,
                            node_ref.clone(),
                            attempt,
                            summarize_output(&outputs),
                        )
                        .with_metadata(metadata),
                    ])
                    .await?;
                Ok(Ok(outputs))
            }
            Err(error) => {
                let mut record =
                    NodeIoRecord::running().with_inputs(inputs_payload, inputs_size);
                record.fail(error.message.clone(), error.kind);
                self.persist_record(run_id, &node_ref, attempt, record).await?;
                self.publish_failure(run_id, &node_ref, attempt, &error, &metadata)
                    .await?;
                Ok(Err(error))
            }
        }
    }

    fn metadata_for(
        &self,
        request: &ActivityRequest,
        ctx: &ActivityContext,
        attempt: u32,
        policy: &palisade_component::RetryPolicy,
    ) -> TraceMetadata {
        TraceMetadata {
            activity_id: Some(ctx.activity_id),
            attempt: Some(attempt),
            stream_id: request.action.stream_id.clone(),
            group_id: request.action.group_id.clone(),
            join_strategy: (request.action.depends_on.len() > 1)
                .then_some(request.action.join_strategy),
            triggered_by: request.triggered_by.clone(),
            retry_policy: (attempt == 1)
                .then(|| serde_json::to_value(policy).ok())
                .flatten(),
        }
    }

    async fn persist_record(
        &self,
        run_id: RunId,
        node_ref: &NodeRef,
        attempt: u32,
        record: NodeIoRecord,
    ) -> Result<(), RuntimeError> {
        self.bus
            .store()
            .upsert_node_io(run_id, node_ref.clone(), attempt, record)
            .await?;
        Ok(())
    }

    async fn publish_failure(
        &self,
        run_id: RunId,
        node_ref: &NodeRef,
        attempt: u32,
        error: &ComponentError,
        metadata: &TraceMetadata,
    ) -> Result<(), RuntimeError> {
        self.bus
            .publish(run_id, vec![
                TraceEvent::failed(run_id, node_ref.clone(), attempt, TraceError {
                    message: error.message.clone(),
                    kind: error.kind,
                    details: error.details.clone(),
                })
                .with_metadata(metadata.clone()),
            ])
            .await?;
        Ok(())
    }
}

/// Validate runner outputs against the effective output schema.
///
/// Outputs must be an object; declared ports coerce toward their schema and
/// a value that cannot fit fails the attempt with `ValidationError`.
fn validate_outputs(outputs: Value, schema: &PortSet) -> Result<Value, ComponentError> {
    let Value::Object(mut map) = outputs else {
        return Err(ComponentError::validation(
            "component returned a non-object output",
        ));
    };

    for (port_key, port) in schema {
        if let Some(value) = map.remove(port_key) {
            match coerce(value, &port.schema) {
                CoercionOutcome::Unchanged(v) | CoercionOutcome::Coerced(v) => {
                    map.insert(port_key.clone(), v);
                }
                CoercionOutcome::Failed { reason } => {
                    return Err(ComponentError::validation(format!(
                        "output `{port_key}`: {reason}"
                    )));
                }
            }
        }
    }

    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palisade_component::{ComponentDefinition, ProgressEvent, RetryPolicy};
    use palisade_core::{WorkflowId, WorkflowVersionId};
    use palisade_execution::{NewRun, NodeIoStatus, TraceEventType};
    use palisade_ports::{DataType, PortSpec};
    use palisade_store::{ExecutionStore, MemoryBlobStore, MemoryStore};
    use palisade_workflow::JoinStrategy;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn r(s: &str) -> NodeRef {
        NodeRef::new(s).unwrap()
    }

    fn action(node_ref: &str) -> ActionDefinition {
        ActionDefinition {
            node_ref: r(node_ref),
            component_id: "test".into(),
            label: node_ref.into(),
            params: Map::new(),
            depends_on: vec![],
            input_mappings: indexmap::IndexMap::new(),
            edge_kinds: vec![],
            join_strategy: JoinStrategy::All,
            max_concurrency: None,
            stream_id: None,
            group_id: None,
        }
    }

    async fn harness() -> (ActivityRuntime, Arc<MemoryStore>, RunId) {
        let store = Arc::new(MemoryStore::new());
        let run = store
            .create_run(NewRun {
                workflow_id: WorkflowId::v4(),
                workflow_version_id: WorkflowVersionId::v4(),
                workflow_version: 1,
                total_actions: 1,
                ..NewRun::default()
            })
            .await
            .unwrap();
        let bus = Arc::new(TraceBus::new(Arc::clone(&store) as _));
        let spill = SpillPolicy::new(Arc::new(MemoryBlobStore::new()), 1024);
        (ActivityRuntime::new(bus, spill), store, run.run_id)
    }

    fn request(
        run_id: RunId,
        action: ActionDefinition,
        component: Arc<dyn Component>,
    ) -> ActivityRequest {
        ActivityRequest {
            run_id,
            action,
            component,
            upstream: HashMap::new(),
            manual_inputs: Map::new(),
            param_overrides: Map::new(),
            seed_inputs: None,
            cancellation: CancellationToken::new(),
            triggered_by: None,
            http: None,
            secrets: None,
            artifacts: None,
        }
    }

    async fn event_types(store: &MemoryStore, run_id: RunId) -> Vec<(TraceEventType, Option<u32>)> {
        store
            .list_events(run_id, None, 1000)
            .await
            .unwrap()
            .events
            .iter()
            .map(|e| (e.event_type, e.metadata.attempt))
            .collect()
    }

    /// Fails with the given kind until `succeed_on`, then succeeds.
    struct Flaky {
        definition: ComponentDefinition,
        calls: AtomicU32,
        succeed_on: u32,
        kind: ErrorKind,
    }

    impl Flaky {
        fn new(succeed_on: u32, kind: ErrorKind, policy: RetryPolicy) -> Self {
            Self {
                definition: ComponentDefinition::new("test.flaky", "Flaky")
                    .with_output("out", PortSpec::new(DataType::number()))
                    .with_retry_policy(policy),
                calls: AtomicU32::new(0),
                succeed_on,
                kind,
            }
        }
    }

    #[async_trait]
    impl Component for Flaky {
        fn definition(&self) -> &ComponentDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            _request: ExecuteRequest,
            _ctx: &ActivityContext,
        ) -> Result<Value, ComponentError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(json!({"out": call}))
            } else {
                Err(ComponentError::new(self.kind, "transient failure"))
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn retry_then_succeed_trace_shape() {
        let (runtime, store, run_id) = harness().await;
        let component = Arc::new(Flaky::new(3, ErrorKind::Network, fast_policy(3)));
        let outcome = runtime
            .execute(request(run_id, action("probe"), component))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap()["out"], 3);

        let events = event_types(&store, run_id).await;
        assert_eq!(
            events,
            vec![
                (TraceEventType::Started, Some(1)),
                (TraceEventType::Failed, Some(1)),
                (TraceEventType::Started, Some(2)),
                (TraceEventType::Failed, Some(2)),
                (TraceEventType::Started, Some(3)),
                (TraceEventType::Completed, Some(3)),
            ]
        );
    }

    #[tokio::test]
    async fn retries_exhaust_into_failure() {
        let (runtime, store, run_id) = harness().await;
        let component = Arc::new(Flaky::new(10, ErrorKind::Network, fast_policy(2)));
        let outcome = runtime
            .execute(request(run_id, action("probe"), component))
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Network);

        let record = store
            .get_node_io(run_id, r("probe"), 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, NodeIoStatus::Failed);
        assert_eq!(record.error_kind, Some(ErrorKind::Network));
    }

    #[tokio::test]
    async fn non_retryable_kind_fails_on_first_attempt() {
        let (runtime, store, run_id) = harness().await;
        let component = Arc::new(Flaky::new(10, ErrorKind::Authentication, fast_policy(5)));
        let outcome = runtime
            .execute(request(run_id, action("auth"), component))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Authentication);
        let events = event_types(&store, run_id).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, TraceEventType::Failed);
    }

    /// Emits progress forever until cancelled.
    struct Heartbeat {
        definition: ComponentDefinition,
    }

    impl Heartbeat {
        fn new() -> Self {
            Self {
                definition: ComponentDefinition::new("test.heartbeat", "Heartbeat")
                    .with_retry_policy(RetryPolicy::none()),
            }
        }
    }

    #[async_trait]
    impl Component for Heartbeat {
        fn definition(&self) -> &ComponentDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            _request: ExecuteRequest,
            ctx: &ActivityContext,
        ) -> Result<Value, ComponentError> {
            loop {
                ctx.check_cancelled()?;
                ctx.emit_progress(ProgressEvent::info("beat"));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    #[tokio::test]
    async fn cancellation_produces_cancelled_failure_with_no_progress_after_terminal() {
        let (runtime, store, run_id) = harness().await;
        let cancellation = CancellationToken::new();
        let mut req = request(run_id, action("beat"), Arc::new(Heartbeat::new()));
        req.cancellation = cancellation.clone();

        let cancel_after = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            cancel_after.cancel();
        });

        let outcome = runtime.execute(req).await.unwrap();
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Cancelled);
        assert_eq!(outcome.attempts, 1);

        let events = store.list_events(run_id, None, 1000).await.unwrap().events;
        let terminal_pos = events
            .iter()
            .position(|e| e.event_type.is_terminal())
            .unwrap();
        assert_eq!(events[terminal_pos].event_type, TraceEventType::Failed);
        assert!(
            events[terminal_pos..]
                .iter()
                .all(|e| e.event_type != TraceEventType::Progress),
            "no PROGRESS after the terminal event"
        );
        // Some heartbeats made it out before cancellation.
        assert!(events.iter().any(|e| e.event_type == TraceEventType::Progress));
    }

    /// Echoes routed inputs.
    struct EchoInputs {
        definition: ComponentDefinition,
    }

    impl EchoInputs {
        fn new() -> Self {
            Self {
                definition: ComponentDefinition::new("test.echo", "Echo")
                    .with_input("target", PortSpec::new(DataType::text()).required())
                    .with_input(
                        "depth",
                        PortSpec::new(DataType::number()).with_default(json!(2)),
                    )
                    .with_output("echo", PortSpec::new(DataType::json()))
                    .with_retry_policy(RetryPolicy::none()),
            }
        }
    }

    #[async_trait]
    impl Component for EchoInputs {
        fn definition(&self) -> &ComponentDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            request: ExecuteRequest,
            _ctx: &ActivityContext,
        ) -> Result<Value, ComponentError> {
            Ok(json!({"echo": request.inputs}))
        }
    }

    #[tokio::test]
    async fn routes_coerces_and_defaults_inputs() {
        let (runtime, store, run_id) = harness().await;
        let mut act = action("echo");
        act.input_mappings.insert(
            "target".into(),
            vec![palisade_workflow::InputSource {
                source_ref: r("up"),
                source_handle: "host".into(),
            }],
        );
        let mut req = request(run_id, act, Arc::new(EchoInputs::new()));
        req.upstream
            .insert(r("up"), json!({"host": "10.0.0.9"}));

        let outcome = runtime.execute(req).await.unwrap();
        let outputs = outcome.result.unwrap();
        assert_eq!(outputs["echo"]["target"], "10.0.0.9");
        assert_eq!(outputs["echo"]["depth"], 2);

        // The record carries exactly what the component saw.
        let record = store
            .get_node_io(run_id, r("echo"), 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, NodeIoStatus::Completed);
        let inputs = record.inputs.unwrap();
        assert_eq!(
            inputs.as_inline().unwrap()["target"],
            "10.0.0.9"
        );
    }

    #[tokio::test]
    async fn missing_required_input_is_validation_failure() {
        let (runtime, store, run_id) = harness().await;
        let outcome = runtime
            .execute(request(run_id, action("echo"), Arc::new(EchoInputs::new())))
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Validation);

        let events = event_types(&store, run_id).await;
        assert_eq!(
            events,
            vec![
                (TraceEventType::Started, Some(1)),
                (TraceEventType::Failed, Some(1)),
            ]
        );
    }

    #[tokio::test]
    async fn seed_inputs_bypass_routing() {
        let (runtime, _store, run_id) = harness().await;
        let mut req = request(run_id, action("entry"), Arc::new(EchoInputs::new()));
        let mut seed = Map::new();
        seed.insert("target".into(), json!("seeded"));
        req.seed_inputs = Some(seed);

        let outcome = runtime.execute(req).await.unwrap();
        assert_eq!(outcome.result.unwrap()["echo"]["target"], "seeded");
    }

    #[tokio::test]
    async fn large_outputs_spill() {
        struct Big {
            definition: ComponentDefinition,
        }

        #[async_trait]
        impl Component for Big {
            fn definition(&self) -> &ComponentDefinition {
                &self.definition
            }

            async fn execute(
                &self,
                _request: ExecuteRequest,
                _ctx: &ActivityContext,
            ) -> Result<Value, ComponentError> {
                Ok(json!({"blob": "x".repeat(5000)}))
            }
        }

        let (runtime, store, run_id) = harness().await;
        let component = Arc::new(Big {
            definition: ComponentDefinition::new("test.big", "Big")
                .with_retry_policy(RetryPolicy::none()),
        });
        let outcome = runtime
            .execute(request(run_id, action("big"), component))
            .await
            .unwrap();
        assert!(outcome.is_success());

        let record = store
            .get_node_io(run_id, r("big"), 1)
            .await
            .unwrap()
            .unwrap();
        assert!(record.outputs_spilled);
        assert!(record.outputs_size > 1024);
        assert!(record.outputs.unwrap().is_spilled());

        // The COMPLETED summary elides the long string.
        let events = store.list_events(run_id, None, 100).await.unwrap().events;
        let completed = events
            .iter()
            .find(|e| e.event_type == TraceEventType::Completed)
            .unwrap();
        let summary = completed.output_summary.as_ref().unwrap();
        assert!(summary["blob"].as_str().unwrap().len() < 5000);
    }

    #[tokio::test]
    async fn non_object_output_is_validation_failure() {
        struct Scalar {
            definition: ComponentDefinition,
        }

        #[async_trait]
        impl Component for Scalar {
            fn definition(&self) -> &ComponentDefinition {
                &self.definition
            }

            async fn execute(
                &self,
                _request: ExecuteRequest,
                _ctx: &ActivityContext,
            ) -> Result<Value, ComponentError> {
                Ok(json!(42))
            }
        }

        let (runtime, _store, run_id) = harness().await;
        let component = Arc::new(Scalar {
            definition: ComponentDefinition::new("test.scalar", "Scalar")
                .with_retry_policy(RetryPolicy::none()),
        });
        let outcome = runtime
            .execute(request(run_id, action("scalar"), component))
            .await
            .unwrap();
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn started_metadata_carries_policy_and_tags() {
        let (runtime, store, run_id) = harness().await;
        let mut act = action("tagged");
        act.stream_id = Some("s-1".into());
        act.group_id = Some("g-1".into());
        let mut req = request(run_id, act, Arc::new(EchoInputs::new()));
        req.triggered_by = Some("upstream-x".into());
        let mut seed = Map::new();
        seed.insert("target".into(), json!("t"));
        req.seed_inputs = Some(seed);

        runtime.execute(req).await.unwrap();
        let events = store.list_events(run_id, None, 10).await.unwrap().events;
        let started = &events[0];
        assert_eq!(started.metadata.stream_id.as_deref(), Some("s-1"));
        assert_eq!(started.metadata.group_id.as_deref(), Some("g-1"));
        assert_eq!(started.metadata.triggered_by.as_deref(), Some("upstream-x"));
        assert!(started.metadata.retry_policy.is_some());
        assert!(started.metadata.activity_id.is_some());
    }
}
