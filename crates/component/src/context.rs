//! Runtime context provided to every activity invocation.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use palisade_core::{ActivityId, NodeRef, RunId};
use secrecy::SecretString;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ComponentError;
use crate::progress::{ProgressEvent, ProgressSink};

/// Port trait for outbound HTTP, implemented by the runtime.
///
/// Components never construct HTTP clients themselves — the facade lets the
/// runtime enforce redaction of sensitive headers and classify transport
/// failures into the error taxonomy.
#[async_trait]
pub trait HttpPort: Send + Sync {
    /// Perform one request.
    async fn fetch(&self, request: HttpRequestSpec) -> Result<HttpResponseData, ComponentError>;
}

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    /// HTTP method (`GET`, `POST`, …).
    pub method: String,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
    /// Header names whose values must be redacted from logs. They are sent
    /// on the wire unredacted.
    pub sensitive_headers: Vec<String>,
}

impl HttpRequestSpec {
    /// A GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// A POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// A request with an arbitrary method.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            sensitive_headers: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a header whose value is redacted from logs.
    #[must_use]
    pub fn with_sensitive_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.sensitive_headers.push(name.clone());
        self.headers.push((name, value.into()));
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response surfaced to components.
#[derive(Debug, Clone)]
pub struct HttpResponseData {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Body, parsed as JSON when possible, else a JSON string.
    pub body: Value,
}

impl HttpResponseData {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Port trait for resolving secrets, implemented by the hosting worker.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Retrieve a secret value by key.
    async fn get(&self, key: &str) -> Result<SecretString, ComponentError>;
}

/// Port trait for storing and retrieving activity artifacts (files, large
/// byte blobs) outside the node payload path.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store bytes under a key, returning the storage key.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<String, ComponentError>;

    /// Retrieve bytes by key.
    async fn get(&self, key: &str) -> Result<Bytes, ComponentError>;
}

/// Port trait for per-activity structured logging.
///
/// The runtime implementation forwards into `tracing` with the run and node
/// fields attached; components just emit messages.
pub trait ActivityLogger: Send + Sync {
    /// Log at debug level.
    fn debug(&self, message: &str);
    /// Log at info level.
    fn info(&self, message: &str);
    /// Log at warn level.
    fn warn(&self, message: &str);
    /// Log at error level.
    fn error(&self, message: &str);
}

/// Runtime context handed to every component invocation.
///
/// Identifies which run/node/attempt this is and provides the ports a
/// component may use: progress emission, cancellation, HTTP, secrets,
/// artifacts and logging. Components **must** check
/// [`check_cancelled`](Self::check_cancelled) in long-running loops.
#[non_exhaustive]
pub struct ActivityContext {
    /// Run this activity belongs to.
    pub run_id: RunId,
    /// Node ref of the action being executed.
    pub component_ref: NodeRef,
    /// Unique id of this activity dispatch.
    pub activity_id: ActivityId,
    /// Attempt number, 1-based.
    pub attempt: u32,
    /// Opaque correlation tags (`stream_id`, `group_id`, trigger info).
    pub metadata: serde_json::Map<String, Value>,
    /// Cancellation signal — checked cooperatively by components.
    pub cancellation: CancellationToken,
    progress: Option<ProgressSink>,
    http: Option<Arc<dyn HttpPort>>,
    secrets: Option<Arc<dyn SecretProvider>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    logger: Option<Arc<dyn ActivityLogger>>,
}

impl ActivityContext {
    /// Create a context with the given identity and no ports attached.
    #[must_use]
    pub fn new(run_id: RunId, component_ref: NodeRef, attempt: u32) -> Self {
        Self {
            run_id,
            component_ref,
            activity_id: ActivityId::v4(),
            attempt,
            metadata: serde_json::Map::new(),
            cancellation: CancellationToken::new(),
            progress: None,
            http: None,
            secrets: None,
            artifacts: None,
            logger: None,
        }
    }

    /// Use a pre-existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Attach correlation metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach the progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Attach the HTTP port.
    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpPort>) -> Self {
        self.http = Some(http);
        self
    }

    /// Attach the secret provider.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Attach the artifact store.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Attach a logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Emit a progress event. No-op when no sink is attached.
    pub fn emit_progress(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink.emit(event);
        }
    }

    /// Check whether execution has been cancelled.
    pub fn check_cancelled(&self) -> Result<(), ComponentError> {
        if self.cancellation.is_cancelled() {
            Err(ComponentError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Perform an HTTP request through the runtime facade.
    pub async fn fetch(
        &self,
        request: HttpRequestSpec,
    ) -> Result<HttpResponseData, ComponentError> {
        match &self.http {
            Some(http) => http.fetch(request).await,
            None => Err(ComponentError::configuration(
                "no HTTP port attached to this activity",
            )),
        }
    }

    /// Resolve a secret by key.
    pub async fn secret(&self, key: &str) -> Result<SecretString, ComponentError> {
        match &self.secrets {
            Some(secrets) => secrets.get(key).await,
            None => Err(ComponentError::configuration(
                "no secret provider attached to this activity",
            )),
        }
    }

    /// Store an artifact.
    pub async fn put_artifact(&self, key: &str, bytes: Bytes) -> Result<String, ComponentError> {
        match &self.artifacts {
            Some(artifacts) => artifacts.put(key, bytes).await,
            None => Err(ComponentError::configuration(
                "no artifact store attached to this activity",
            )),
        }
    }

    /// Retrieve an artifact.
    pub async fn get_artifact(&self, key: &str) -> Result<Bytes, ComponentError> {
        match &self.artifacts {
            Some(artifacts) => artifacts.get(key).await,
            None => Err(ComponentError::configuration(
                "no artifact store attached to this activity",
            )),
        }
    }

    /// Log a debug message. No-op without a logger.
    pub fn log_debug(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.debug(message);
        }
    }

    /// Log an info message. No-op without a logger.
    pub fn log_info(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.info(message);
        }
    }

    /// Log a warning. No-op without a logger.
    pub fn log_warn(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.warn(message);
        }
    }

    /// Log an error. No-op without a logger.
    pub fn log_error(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.error(message);
        }
    }
}

impl std::fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityContext")
            .field("run_id", &self.run_id)
            .field("component_ref", &self.component_ref)
            .field("activity_id", &self.activity_id)
            .field("attempt", &self.attempt)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_context() -> ActivityContext {
        ActivityContext::new(RunId::v4(), NodeRef::new("node-1").unwrap(), 1)
    }

    #[test]
    fn new_context_identity() {
        let ctx = test_context();
        assert_eq!(ctx.attempt, 1);
        assert_eq!(ctx.component_ref, "node-1");
        assert!(!ctx.cancellation.is_cancelled());
    }

    #[test]
    fn check_cancelled_ok_then_err() {
        let ctx = test_context();
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancellation.cancel();
        let err = ctx.check_cancelled().unwrap_err();
        assert_eq!(err.kind, palisade_core::ErrorKind::Cancelled);
    }

    #[test]
    fn with_cancellation_token_links_parent() {
        let token = CancellationToken::new();
        let ctx = test_context().with_cancellation(token.child_token());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(ctx.check_cancelled().is_err());
    }

    #[tokio::test]
    async fn emit_progress_without_sink_is_noop() {
        let ctx = test_context();
        ctx.emit_progress(ProgressEvent::info("harmless"));
    }

    #[tokio::test]
    async fn emit_progress_with_sink_delivers() {
        let (sink, mut rx) = ProgressSink::channel();
        let ctx = test_context().with_progress(sink);
        ctx.emit_progress(ProgressEvent::info("step 1"));
        assert_eq!(rx.recv().await.unwrap().message, "step 1");
    }

    #[tokio::test]
    async fn fetch_without_port_is_configuration_error() {
        let ctx = test_context();
        let err = ctx.fetch(HttpRequestSpec::get("http://example")).await.unwrap_err();
        assert_eq!(err.kind, palisade_core::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn secret_without_provider_is_configuration_error() {
        let ctx = test_context();
        let err = ctx.secret("api-key").await.unwrap_err();
        assert_eq!(err.kind, palisade_core::ErrorKind::Configuration);
    }

    #[test]
    fn log_methods_noop_without_logger() {
        let ctx = test_context();
        ctx.log_debug("debug");
        ctx.log_info("info");
        ctx.log_warn("warn");
        ctx.log_error("error");
    }

    #[test]
    fn sensitive_header_is_tracked() {
        let req = HttpRequestSpec::post("http://api")
            .with_header("content-type", "application/json")
            .with_sensitive_header("authorization", "Bearer tok");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.sensitive_headers, vec!["authorization"]);
    }

    #[test]
    fn response_success_range() {
        let ok = HttpResponseData {
            status: 204,
            headers: vec![],
            body: Value::Null,
        };
        assert!(ok.is_success());
        let bad = HttpResponseData {
            status: 404,
            headers: vec![],
            body: Value::Null,
        };
        assert!(!bad.is_success());
    }

    #[test]
    fn debug_format_redacts_ports() {
        let ctx = test_context();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("ActivityContext"));
        assert!(debug.contains("run_id"));
    }
}
