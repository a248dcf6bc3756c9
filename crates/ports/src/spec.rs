//! Per-port schemas.
//!
//! A [`PortSpec`] describes one input, output or parameter slot on a
//! component: its data type, whether it is required, its default, the editor
//! hint, and how routed values and manual overrides are prioritised.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::datatype::DataType;

/// Editor rendering hint for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortEditor {
    /// Plain field, rendered by type.
    #[default]
    Default,
    /// Masked input; values are redacted from logs but passed to runners.
    Secret,
    /// Multi-line text area.
    Multiline,
    /// JSON editor.
    Code,
}

/// Which source wins when a port has both a routed upstream value and a
/// manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePriority {
    /// The routed upstream value wins; the override is the fallback.
    #[default]
    AutoFirst,
    /// The manual override wins; used for params bound to inputs.
    ManualFirst,
}

/// Schema of one port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    /// The port's data type.
    pub schema: DataType,
    /// Whether the activity fails with `ValidationError` when no value
    /// resolves for this port.
    #[serde(default)]
    pub required: bool,
    /// Value used when nothing routes to the port and no override is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Short description shown in the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Editor rendering hint.
    #[serde(default)]
    pub editor: PortEditor,
    /// Routing priority between upstream values and overrides.
    #[serde(default)]
    pub value_priority: ValuePriority,
}

impl PortSpec {
    /// A port of the given type with library defaults (optional, no default
    /// value, auto-first).
    #[must_use]
    pub fn new(schema: DataType) -> Self {
        Self {
            schema,
            required: false,
            default: None,
            label: None,
            description: None,
            editor: PortEditor::default(),
            value_priority: ValuePriority::default(),
        }
    }

    /// Mark the port required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the editor hint.
    #[must_use]
    pub fn with_editor(mut self, editor: PortEditor) -> Self {
        self.editor = editor;
        self
    }

    /// Set the value priority.
    #[must_use]
    pub fn with_priority(mut self, priority: ValuePriority) -> Self {
        self.value_priority = priority;
        self
    }

    /// Returns `true` if values of this port must be redacted from logs.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.editor == PortEditor::Secret || self.schema.contains_secret()
    }
}

/// Ordered set of ports, keyed by port id.
///
/// Insertion order is preserved — it is the declaration order the component
/// author chose, and downstream consumers (the compiler, summaries, the
/// editor) rely on it being stable.
pub type PortSet = IndexMap<String, PortSpec>;

/// Convenience constructor for the common single-port set.
#[must_use]
pub fn single_port(key: impl Into<String>, spec: PortSpec) -> PortSet {
    let mut set = PortSet::new();
    set.insert(key.into(), spec);
    set
}
