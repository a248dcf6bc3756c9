//! Immutable component definitions.

use std::time::Duration;

use palisade_ports::{PortSet, PortSpec};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Where an activity for this component executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerSpec {
    /// Call `execute` directly inside the worker.
    Inline,
    /// Run the declared image, streaming JSON over stdin/stdout.
    Container {
        /// OCI image reference.
        image: String,
        /// Command and arguments passed to the container.
        command: Vec<String>,
        /// Hard deadline for one attempt, in seconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
    },
    /// Reserved for dispatch to a remote worker pool.
    Remote,
}

impl RunnerSpec {
    /// Effective per-attempt timeout, if the runner declares one.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Container {
                timeout_seconds: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Returns `true` for the inline runner.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline)
    }
}

/// Effective port schemas produced by a `resolve_ports` hook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedPorts {
    /// Effective inputs, replacing the static declaration.
    pub inputs: PortSet,
    /// Effective outputs, replacing the static declaration.
    pub outputs: PortSet,
}

/// Immutable description of a component type.
///
/// Definitions are built once at registry-initialisation time and shared as
/// `Arc<dyn Component>`; nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Globally unique component id (e.g. `core.http.request`).
    pub id: String,
    /// Human-readable name shown in the editor.
    pub label: String,
    /// Palette category.
    pub category: String,
    /// Static input ports, in declaration order.
    #[serde(default)]
    pub inputs: PortSet,
    /// Static output ports, in declaration order.
    #[serde(default)]
    pub outputs: PortSet,
    /// Configuration parameters, keyed like inputs.
    #[serde(default)]
    pub parameters: PortSet,
    /// Where activities of this component execute.
    pub runner: RunnerSpec,
    /// Retry behaviour the runtime enforces.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

impl ComponentDefinition {
    /// Start building a definition with the library defaults: no ports,
    /// inline runner, default retry policy, category `"general"`.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category: "general".into(),
            inputs: PortSet::new(),
            outputs: PortSet::new(),
            parameters: PortSet::new(),
            runner: RunnerSpec::Inline,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Declare an input port.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, spec: PortSpec) -> Self {
        self.inputs.insert(key.into(), spec);
        self
    }

    /// Declare an output port.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, spec: PortSpec) -> Self {
        self.outputs.insert(key.into(), spec);
        self
    }

    /// Declare a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, spec: PortSpec) -> Self {
        self.parameters.insert(key.into(), spec);
        self
    }

    /// Set the runner.
    #[must_use]
    pub fn with_runner(mut self, runner: RunnerSpec) -> Self {
        self.runner = runner;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}
