//! Input routing.
//!
//! For every declared input port the runtime chooses between the routed
//! upstream value and the manual override according to the port's
//! `value_priority`, then coerces toward the port schema. A failed coercion
//! is a warning — the port falls back to its schema default; a required
//! port with no resolved value fails the activity with `ValidationError`.

use std::collections::HashMap;

use indexmap::IndexMap;
use palisade_component::ComponentError;
use palisade_core::NodeRef;
use palisade_ports::{CoercionOutcome, PortSet, ValuePriority, coerce};
use palisade_workflow::InputSource;
use serde_json::{Map, Value};

/// Result of routing one action's inputs.
#[derive(Debug, Clone, Default)]
pub struct RoutedInputs {
    /// Final per-port values.
    pub values: Map<String, Value>,
    /// Human-readable coercion warnings, surfaced as `PROGRESS` events.
    pub warnings: Vec<String>,
}

/// Resolve values for every declared input port.
///
/// `upstream` maps a predecessor ref to its output object (keyed by output
/// port). `manual` holds override values keyed by input port — the node's
/// pinned values overlaid with any run-level override.
pub fn route_inputs(
    ports: &PortSet,
    mappings: &IndexMap<String, Vec<InputSource>>,
    upstream: &HashMap<NodeRef, Value>,
    manual: &Map<String, Value>,
) -> Result<RoutedInputs, ComponentError> {
    let mut routed = RoutedInputs::default();

    for (port_key, port) in ports {
        let auto = auto_value(port_key, port.schema.is_list(), mappings, upstream);
        let override_value = manual.get(port_key).cloned();

        let chosen = match port.value_priority {
            ValuePriority::AutoFirst => auto.or(override_value),
            ValuePriority::ManualFirst => override_value.or(auto),
        };

        let resolved = match chosen {
            Some(value) => match coerce(value, &port.schema) {
                CoercionOutcome::Unchanged(v) | CoercionOutcome::Coerced(v) => Some(v),
                CoercionOutcome::Failed { reason } => {
                    routed
                        .warnings
                        .push(format!("input `{port_key}`: {reason}; using default"));
                    None
                }
            },
            None => None,
        };

        match resolved.or_else(|| port.default.clone()) {
            Some(value) => {
                routed.values.insert(port_key.clone(), value);
            }
            None if port.required => {
                return Err(ComponentError::validation(format!(
                    "required input `{port_key}` has no value"
                )));
            }
            None => {}
        }
    }

    Ok(routed)
}

/// The routed upstream value for one port, if any.
///
/// A list-typed port with several sources collects present values into an
/// array (sources are already in topological order from compilation); any
/// other port takes its single mapped source.
fn auto_value(
    port_key: &str,
    is_list: bool,
    mappings: &IndexMap<String, Vec<InputSource>>,
    upstream: &HashMap<NodeRef, Value>,
) -> Option<Value> {
    let sources = mappings.get(port_key)?;
    let present: Vec<Value> = sources
        .iter()
        .filter_map(|source| {
            upstream
                .get(&source.source_ref)
                .and_then(|outputs| outputs.get(&source.source_handle))
                .cloned()
        })
        .collect();

    if is_list && sources.len() > 1 {
        if present.is_empty() {
            None
        } else {
            Some(Value::Array(present))
        }
    } else {
        present.into_iter().next()
    }
}

/// Overlay `patch` onto `base`, key by key (`patch` wins).
#[must_use]
pub fn merge_params(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
