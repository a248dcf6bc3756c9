//! Runtime value coercion.
//!
//! The coercion table is fixed: text↔number and text↔boolean convert in both
//! directions, `any` accepts everything, and lists coerce element-wise. A
//! failed coercion is a warning, never an error — the caller leaves the field
//! unset and lets the schema default (or requiredness) decide.

use serde_json::Value;

use crate::datatype::{DataType, PrimitiveType};

/// Result of coercing one value toward a target type.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionOutcome {
    /// The value already matches the target type.
    Unchanged(Value),
    /// The value was converted.
    Coerced(Value),
    /// The value cannot be represented in the target type.
    Failed {
        /// Human-readable description for the warning trail.
        reason: String,
    },
}

impl CoercionOutcome {
    /// Extract the usable value, if coercion did not fail.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Unchanged(v) | Self::Coerced(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }

    /// Returns `true` if the coercion failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Coerce `value` toward `target`.
#[must_use]
pub fn coerce(value: Value, target: &DataType) -> CoercionOutcome {
    match target {
        DataType::Primitive { name, .. } => coerce_primitive(value, *name),
        DataType::List { element } => coerce_list(value, element),
        // Maps and contracts carry structured payloads; accept objects as-is.
        DataType::Map { .. } | DataType::Contract { .. } => {
            if value.is_object() {
                CoercionOutcome::Unchanged(value)
            } else {
                CoercionOutcome::Failed {
                    reason: format!("expected object for {target}, got {}", kind_of(&value)),
                }
            }
        }
    }
}

fn coerce_primitive(value: Value, target: PrimitiveType) -> CoercionOutcome {
    match target {
        // any → T and T → any are both accepted unchanged.
        PrimitiveType::Any | PrimitiveType::Json => CoercionOutcome::Unchanged(value),
        PrimitiveType::Text | PrimitiveType::Secret | PrimitiveType::File => {
            coerce_to_text(value, target)
        }
        PrimitiveType::Number => coerce_to_number(value),
        PrimitiveType::Boolean => coerce_to_boolean(value),
    }
}

fn coerce_to_text(value: Value, target: PrimitiveType) -> CoercionOutcome {
    match value {
        Value::String(_) => CoercionOutcome::Unchanged(value),
        // number → text and boolean → text via the text↔number / text↔boolean table.
        Value::Number(n) if target == PrimitiveType::Text => {
            CoercionOutcome::Coerced(Value::String(n.to_string()))
        }
        Value::Bool(b) if target == PrimitiveType::Text => {
            CoercionOutcome::Coerced(Value::String(b.to_string()))
        }
        other => CoercionOutcome::Failed {
            reason: format!("cannot coerce {} to {}", kind_of(&other), target.as_str()),
        },
    }
}

fn coerce_to_number(value: Value) -> CoercionOutcome {
    match value {
        Value::Number(_) => CoercionOutcome::Unchanged(value),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => serde_json::Number::from_f64(n).map_or(
                CoercionOutcome::Failed {
                    reason: format!("text {s:?} is not a finite number"),
                },
                |n| CoercionOutcome::Coerced(Value::Number(n)),
            ),
            Err(_) => CoercionOutcome::Failed {
                reason: format!("text {s:?} does not parse as a number"),
            },
        },
        other => CoercionOutcome::Failed {
            reason: format!("cannot coerce {} to number", kind_of(&other)),
        },
    }
}

fn coerce_to_boolean(value: Value) -> CoercionOutcome {
    match value {
        Value::Bool(_) => CoercionOutcome::Unchanged(value),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => CoercionOutcome::Coerced(Value::Bool(true)),
            "false" => CoercionOutcome::Coerced(Value::Bool(false)),
            _ => CoercionOutcome::Failed {
                reason: format!("text {s:?} is not a boolean"),
            },
        },
        other => CoercionOutcome::Failed {
            reason: format!("cannot coerce {} to boolean", kind_of(&other)),
        },
    }
}

fn coerce_list(value: Value, element: &DataType) -> CoercionOutcome {
    let Value::Array(items) = value else {
        return CoercionOutcome::Failed {
            reason: format!("expected list, got {}", kind_of(&value)),
        };
    };

    let mut out = Vec::with_capacity(items.len());
    let mut changed = false;
    for (index, item) in items.into_iter().enumerate() {
        match coerce(item, element) {
            CoercionOutcome::Unchanged(v) => out.push(v),
            CoercionOutcome::Coerced(v) => {
                changed = true;
                out.push(v);
            }
            CoercionOutcome::Failed { reason } => {
                return CoercionOutcome::Failed {
                    reason: format!("element {index}: {reason}"),
                };
            }
        }
    }

    if changed {
        CoercionOutcome::Coerced(Value::Array(out))
    } else {
        CoercionOutcome::Unchanged(Value::Array(out))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
