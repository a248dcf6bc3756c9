//! Builtin core components.
//!
//! The execution core ships only the components it needs to run graphs
//! without an external catalog: the workflow entrypoint, the sub-workflow
//! call marker, a passthrough transform, and an HTTP request component that
//! exercises the context's HTTP port.

use async_trait::async_trait;
use palisade_ports::{DataType, PortSpec};
use serde_json::{Map, Value, json};

use crate::component::{Component, ExecuteRequest};
use crate::context::{ActivityContext, HttpRequestSpec};
use crate::definition::{ComponentDefinition, ResolvedPorts};
use crate::error::ComponentError;
use crate::progress::ProgressEvent;
use crate::registry::ComponentRegistry;
use crate::retry::RetryPolicy;

/// Component id of the workflow entrypoint.
pub const ENTRYPOINT_COMPONENT_ID: &str = "core.workflow.entrypoint";

/// Legacy alias the editor still submits for the entrypoint.
pub const ENTRYPOINT_ALIAS: &str = "entry-point";

/// Component id of the sub-workflow call.
pub const SUBWORKFLOW_COMPONENT_ID: &str = "core.workflow.call";

/// Component id of the passthrough transform.
pub const PASSTHROUGH_COMPONENT_ID: &str = "core.transform.passthrough";

/// Component id of the HTTP request component.
pub const HTTP_REQUEST_COMPONENT_ID: &str = "core.http.request";

/// A registry with every builtin registered, ready for engine startup.
#[must_use]
pub fn builtin_registry() -> ComponentRegistry {
    ComponentRegistry::builder()
        .register(std::sync::Arc::new(Entrypoint::new()))
        .register(std::sync::Arc::new(SubworkflowCall::new()))
        .register(std::sync::Arc::new(Passthrough::new()))
        .register(std::sync::Arc::new(HttpRequest::new()))
        .alias(ENTRYPOINT_ALIAS, ENTRYPOINT_COMPONENT_ID)
        .build()
}

// ── Entrypoint ──────────────────────────────────────────────────────────────

/// The workflow entrypoint.
///
/// Its outputs are the run's trigger inputs. The `outputs` parameter (a map
/// of port id → data type) drives dynamic port resolution so downstream
/// edges can connect to individually-typed trigger fields.
pub struct Entrypoint {
    definition: ComponentDefinition,
}

impl Entrypoint {
    /// Build the entrypoint component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definition: ComponentDefinition::new(ENTRYPOINT_COMPONENT_ID, "Entrypoint")
                .with_category("workflow")
                .with_parameter(
                    "outputs",
                    PortSpec::new(DataType::json())
                        .with_description("Map of trigger field id to data type"),
                )
                .with_output("out", PortSpec::new(DataType::any()))
                .with_retry_policy(RetryPolicy::none()),
        }
    }
}

impl Default for Entrypoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for Entrypoint {
    fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    fn resolve_ports(&self, params: &Map<String, Value>) -> Option<ResolvedPorts> {
        let declared = params.get("outputs")?.as_object()?;
        let mut outputs = palisade_ports::PortSet::new();
        for (key, ty) in declared {
            let schema = serde_json::from_value::<DataType>(ty.clone()).ok()?;
            outputs.insert(key.clone(), PortSpec::new(schema));
        }
        Some(ResolvedPorts {
            inputs: palisade_ports::PortSet::new(),
            outputs,
        })
    }

    async fn execute(
        &self,
        request: ExecuteRequest,
        _ctx: &ActivityContext,
    ) -> Result<Value, ComponentError> {
        // The runtime forwards the run's trigger inputs as this node's
        // inputs; the entrypoint republishes them as its outputs.
        Ok(Value::Object(request.inputs))
    }
}

// ── Sub-workflow call ───────────────────────────────────────────────────────

/// Marker component for invoking another workflow.
///
/// The orchestrator intercepts actions of this component id and starts a
/// child run instead of invoking `execute`. Reaching `execute` means the
/// action was dispatched outside an orchestrator and is a configuration
/// error.
pub struct SubworkflowCall {
    definition: ComponentDefinition,
}

impl SubworkflowCall {
    /// Build the sub-workflow call component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definition: ComponentDefinition::new(SUBWORKFLOW_COMPONENT_ID, "Call Workflow")
                .with_category("workflow")
                .with_parameter(
                    "workflow_id",
                    PortSpec::new(DataType::text())
                        .required()
                        .with_description("Workflow to invoke"),
                )
                .with_parameter(
                    "version_strategy",
                    PortSpec::new(DataType::text())
                        .with_default(json!("latest"))
                        .with_description("`latest` or `specific`"),
                )
                .with_parameter(
                    "version_id",
                    PortSpec::new(DataType::text())
                        .with_description("Version id when strategy is `specific`"),
                )
                .with_input("in", PortSpec::new(DataType::any()))
                .with_output("out", PortSpec::new(DataType::any()))
                .with_retry_policy(RetryPolicy::none()),
        }
    }
}

impl Default for SubworkflowCall {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for SubworkflowCall {
    fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _request: ExecuteRequest,
        _ctx: &ActivityContext,
    ) -> Result<Value, ComponentError> {
        Err(ComponentError::configuration(
            "core.workflow.call is executed by the orchestrator, not as a user function",
        ))
    }
}

// ── Passthrough ─────────────────────────────────────────────────────────────

/// Forwards its input unchanged. Useful for wiring and for tests.
pub struct Passthrough {
    definition: ComponentDefinition,
}

impl Passthrough {
    /// Build the passthrough component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definition: ComponentDefinition::new(PASSTHROUGH_COMPONENT_ID, "Passthrough")
                .with_category("transform")
                .with_input("in", PortSpec::new(DataType::any()))
                .with_output("out", PortSpec::new(DataType::any()))
                .with_retry_policy(RetryPolicy::none()),
        }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for Passthrough {
    fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        request: ExecuteRequest,
        ctx: &ActivityContext,
    ) -> Result<Value, ComponentError> {
        ctx.check_cancelled()?;
        let value = request.inputs.get("in").cloned().unwrap_or(Value::Null);
        Ok(json!({ "out": value }))
    }
}

// ── HTTP request ────────────────────────────────────────────────────────────

/// Performs one HTTP request through the context's HTTP port.
pub struct HttpRequest {
    definition: ComponentDefinition,
}

impl HttpRequest {
    /// Build the HTTP request component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definition: ComponentDefinition::new(HTTP_REQUEST_COMPONENT_ID, "HTTP Request")
                .with_category("network")
                .with_parameter("url", PortSpec::new(DataType::text()).required())
                .with_parameter(
                    "method",
                    PortSpec::new(DataType::text()).with_default(json!("GET")),
                )
                .with_parameter("headers", PortSpec::new(DataType::map(DataType::text())))
                .with_input("body", PortSpec::new(DataType::json()))
                .with_output("response", PortSpec::new(DataType::json()))
                .with_output("status", PortSpec::new(DataType::number()))
                .with_retry_policy(
                    RetryPolicy::default()
                        .with_max_attempts(3)
                        .with_initial_interval(std::time::Duration::from_secs(1)),
                ),
        }
    }

    fn classify_status(status: u16) -> Option<ComponentError> {
        let message = format!("upstream returned HTTP {status}");
        match status {
            200..=399 => None,
            401 => Some(ComponentError::authentication(message)),
            403 => Some(ComponentError::permission(message)),
            404 => Some(ComponentError::not_found(message)),
            429 => Some(ComponentError::rate_limit(message)),
            400..=499 => Some(ComponentError::validation(message)),
            _ => Some(ComponentError::service(message)),
        }
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for HttpRequest {
    fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        request: ExecuteRequest,
        ctx: &ActivityContext,
    ) -> Result<Value, ComponentError> {
        let url = request
            .require_param("url")?
            .as_str()
            .ok_or_else(|| ComponentError::validation("`url` must be text"))?
            .to_owned();
        let method = request
            .param("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_owned();

        let mut spec = HttpRequestSpec::new(method, url);
        if let Some(headers) = request.param("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                let value = value.as_str().unwrap_or_default();
                // Authorization material must never reach logs.
                if name.eq_ignore_ascii_case("authorization")
                    || name.eq_ignore_ascii_case("x-api-key")
                {
                    spec = spec.with_sensitive_header(name, value);
                } else {
                    spec = spec.with_header(name, value);
                }
            }
        }
        if let Some(body) = request.input("body") {
            spec = spec.with_json(body.clone());
        }

        ctx.emit_progress(ProgressEvent::debug(format!(
            "{} {}",
            spec.method, spec.url
        )));
        let response = ctx.fetch(spec).await?;
        if let Some(err) = Self::classify_status(response.status) {
            return Err(err.with_details(json!({ "status": response.status })));
        }

        Ok(json!({
            "response": response.body,
            "status": response.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HttpPort, HttpResponseData};
    use palisade_core::{ErrorKind, NodeRef, RunId};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx() -> ActivityContext {
        ActivityContext::new(RunId::v4(), NodeRef::new("n").unwrap(), 1)
    }

    fn request_with(params: Value, inputs: Value) -> ExecuteRequest {
        ExecuteRequest::new(
            inputs.as_object().cloned().unwrap_or_default(),
            params.as_object().cloned().unwrap_or_default(),
        )
    }

    #[test]
    fn builtin_registry_contains_all() {
        let reg = builtin_registry();
        assert!(reg.contains(ENTRYPOINT_COMPONENT_ID));
        assert!(reg.contains(ENTRYPOINT_ALIAS));
        assert!(reg.contains(SUBWORKFLOW_COMPONENT_ID));
        assert!(reg.contains(PASSTHROUGH_COMPONENT_ID));
        assert!(reg.contains(HTTP_REQUEST_COMPONENT_ID));
        assert_eq!(reg.len(), 4);
    }

    #[tokio::test]
    async fn entrypoint_republishes_inputs() {
        let entry = Entrypoint::new();
        let request = request_with(json!({}), json!({"file_id": "f-1", "severity": "high"}));
        let out = entry.execute(request, &ctx()).await.unwrap();
        assert_eq!(out, json!({"file_id": "f-1", "severity": "high"}));
    }

    #[test]
    fn entrypoint_resolves_dynamic_outputs() {
        let entry = Entrypoint::new();
        let mut params = Map::new();
        params.insert(
            "outputs".into(),
            json!({
                "file_id": {"type": "primitive", "name": "text"},
                "depth": {"type": "primitive", "name": "number"},
            }),
        );
        let resolved = entry.resolve_ports(&params).unwrap();
        assert!(resolved.inputs.is_empty());
        assert_eq!(resolved.outputs.len(), 2);
        assert_eq!(resolved.outputs["file_id"].schema, DataType::text());
        assert_eq!(resolved.outputs["depth"].schema, DataType::number());
    }

    #[test]
    fn entrypoint_without_outputs_param_uses_static_ports() {
        let entry = Entrypoint::new();
        assert!(entry.resolve_ports(&Map::new()).is_none());
    }

    #[tokio::test]
    async fn subworkflow_call_refuses_direct_execution() {
        let call = SubworkflowCall::new();
        let err = call
            .execute(request_with(json!({}), json!({})), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn passthrough_forwards_input() {
        let pass = Passthrough::new();
        let out = pass
            .execute(request_with(json!({}), json!({"in": {"k": 1}})), &ctx())
            .await
            .unwrap();
        assert_eq!(out, json!({"out": {"k": 1}}));
    }

    #[tokio::test]
    async fn passthrough_without_input_emits_null() {
        let pass = Passthrough::new();
        let out = pass
            .execute(request_with(json!({}), json!({})), &ctx())
            .await
            .unwrap();
        assert_eq!(out, json!({"out": null}));
    }

    struct StubHttp {
        status: u16,
    }

    #[async_trait]
    impl HttpPort for StubHttp {
        async fn fetch(
            &self,
            request: HttpRequestSpec,
        ) -> Result<HttpResponseData, ComponentError> {
            Ok(HttpResponseData {
                status: self.status,
                headers: vec![],
                body: json!({"echo_url": request.url, "method": request.method}),
            })
        }
    }

    #[tokio::test]
    async fn http_request_success() {
        let http = HttpRequest::new();
        let ctx = ctx().with_http(Arc::new(StubHttp { status: 200 }));
        let out = http
            .execute(
                request_with(json!({"url": "http://api.internal/scan"}), json!({})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["status"], 200);
        assert_eq!(out["response"]["echo_url"], "http://api.internal/scan");
        assert_eq!(out["response"]["method"], "GET");
    }

    #[tokio::test]
    async fn http_request_classifies_statuses() {
        for (status, kind) in [
            (401, ErrorKind::Authentication),
            (403, ErrorKind::Permission),
            (404, ErrorKind::NotFound),
            (429, ErrorKind::RateLimit),
            (422, ErrorKind::Validation),
            (500, ErrorKind::Service),
            (503, ErrorKind::Service),
        ] {
            let http = HttpRequest::new();
            let ctx = ctx().with_http(Arc::new(StubHttp { status }));
            let err = http
                .execute(request_with(json!({"url": "http://x"}), json!({})), &ctx)
                .await
                .unwrap_err();
            assert_eq!(err.kind, kind, "status {status}");
        }
    }

    #[tokio::test]
    async fn http_request_requires_url() {
        let http = HttpRequest::new();
        let err = http
            .execute(request_with(json!({}), json!({})), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn http_request_marks_auth_header_sensitive() {
        struct CaptureHttp;

        #[async_trait]
        impl HttpPort for CaptureHttp {
            async fn fetch(
                &self,
                request: HttpRequestSpec,
            ) -> Result<HttpResponseData, ComponentError> {
                assert!(request.sensitive_headers.iter().any(|h| h == "Authorization"));
                assert!(!request.sensitive_headers.iter().any(|h| h == "Accept"));
                Ok(HttpResponseData {
                    status: 200,
                    headers: vec![],
                    body: Value::Null,
                })
            }
        }

        let http = HttpRequest::new();
        let ctx = ctx().with_http(Arc::new(CaptureHttp));
        http.execute(
            request_with(
                json!({
                    "url": "http://x",
                    "headers": {"Authorization": "Bearer t", "Accept": "application/json"},
                }),
                json!({}),
            ),
            &ctx,
        )
        .await
        .unwrap();
    }
}
