//! The component execution trait.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ActivityContext;
use crate::definition::{ComponentDefinition, ResolvedPorts};
use crate::error::ComponentError;

/// Parsed inputs and params handed to one invocation.
///
/// Both maps are keyed by port id and already routed, coerced and defaulted
/// by the activity runtime — a component sees exactly what its effective
/// schema promised.
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    /// Values for the effective input ports.
    pub inputs: Map<String, Value>,
    /// Values for the declared parameters, with node overrides applied.
    pub params: Map<String, Value>,
}

impl ExecuteRequest {
    /// Build a request from parts.
    #[must_use]
    pub fn new(inputs: Map<String, Value>, params: Map<String, Value>) -> Self {
        Self { inputs, params }
    }

    /// Fetch an input by port id.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    /// Fetch a param by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Fetch a required input, failing with `ValidationError` when absent.
    pub fn require_input(&self, key: &str) -> Result<&Value, ComponentError> {
        self.input(key)
            .ok_or_else(|| ComponentError::validation(format!("missing required input `{key}`")))
    }

    /// Fetch a required param, failing with `ValidationError` when absent.
    pub fn require_param(&self, key: &str) -> Result<&Value, ComponentError> {
        self.param(key)
            .ok_or_else(|| ComponentError::validation(format!("missing required param `{key}`")))
    }
}

/// A component implementation.
///
/// Object-safe; the registry stores components as `Arc<dyn Component>`.
/// The definition is immutable and shared — `resolve_ports` may derive an
/// effective schema from node params but never mutates the definition.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Static definition: identity, ports, runner, retry policy.
    fn definition(&self) -> &ComponentDefinition;

    /// Compute effective input/output schemas from node params.
    ///
    /// Return `None` to use the static declaration. The compiler and the
    /// activity runtime both call this with the same params, so the schemas
    /// they see agree.
    fn resolve_ports(&self, params: &Map<String, Value>) -> Option<ResolvedPorts> {
        let _ = params;
        None
    }

    /// Execute one attempt.
    ///
    /// Returns the outputs keyed by output port id. Long-running
    /// implementations should call `ctx.check_cancelled()` periodically and
    /// may stream progress through `ctx.emit_progress`.
    async fn execute(
        &self,
        request: ExecuteRequest,
        ctx: &ActivityContext,
    ) -> Result<Value, ComponentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::{NodeRef, RunId};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Echo {
        definition: ComponentDefinition,
    }

    #[async_trait]
    impl Component for Echo {
        fn definition(&self) -> &ComponentDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            request: ExecuteRequest,
            ctx: &ActivityContext,
        ) -> Result<Value, ComponentError> {
            ctx.check_cancelled()?;
            Ok(json!({"echo": request.inputs}))
        }
    }

    fn request() -> ExecuteRequest {
        let mut inputs = Map::new();
        inputs.insert("msg".into(), json!("hi"));
        let mut params = Map::new();
        params.insert("mode".into(), json!("loud"));
        ExecuteRequest::new(inputs, params)
    }

    #[test]
    fn request_accessors() {
        let req = request();
        assert_eq!(req.input("msg"), Some(&json!("hi")));
        assert_eq!(req.param("mode"), Some(&json!("loud")));
        assert!(req.input("absent").is_none());
    }

    #[test]
    fn require_input_fails_with_validation() {
        let req = request();
        assert!(req.require_input("msg").is_ok());
        let err = req.require_input("absent").unwrap_err();
        assert_eq!(err.kind, palisade_core::ErrorKind::Validation);
        assert!(err.message.contains("absent"));
    }

    #[test]
    fn require_param_fails_with_validation() {
        let req = request();
        let err = req.require_param("nope").unwrap_err();
        assert_eq!(err.kind, palisade_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn component_is_object_safe_and_executes() {
        let component: std::sync::Arc<dyn Component> = std::sync::Arc::new(Echo {
            definition: ComponentDefinition::new("test.echo", "Echo"),
        });
        let ctx = ActivityContext::new(RunId::v4(), NodeRef::new("n").unwrap(), 1);
        let out = component.execute(request(), &ctx).await.unwrap();
        assert_eq!(out["echo"]["msg"], "hi");
    }

    #[test]
    fn default_resolve_ports_is_none() {
        let component = Echo {
            definition: ComponentDefinition::new("test.echo", "Echo"),
        };
        assert!(component.resolve_ports(&Map::new()).is_none());
    }
}
