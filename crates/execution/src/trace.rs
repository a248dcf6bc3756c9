//! Trace events — the per-run ordered stream element.

use chrono::{DateTime, Utc};
use palisade_core::{ActivityId, ErrorKind, EventLevel, NodeRef, RunId};
use palisade_workflow::JoinStrategy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceEventType {
    /// An attempt began.
    Started,
    /// The activity reported progress.
    Progress,
    /// An attempt finished with outputs.
    Completed,
    /// An attempt failed.
    Failed,
}

impl TraceEventType {
    /// Returns `true` for the per-attempt terminal kinds.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Structured error payload of a `FAILED` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceError {
    /// Component-supplied message.
    pub message: String,
    /// Taxonomy classification.
    pub kind: ErrorKind,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Correlation metadata attached to trace events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetadata {
    /// The activity dispatch this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<ActivityId>,
    /// Attempt number, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Opaque stream correlation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    /// Opaque group correlation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Join strategy of the action, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_strategy: Option<JoinStrategy>,
    /// What caused the dispatch (e.g. an upstream ref).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    /// Snapshot of the retry policy in force, for replay tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<Value>,
}

/// One element of a run's ordered trace stream.
///
/// `id` is assigned by the store at append time, monotonic and gap-free per
/// run; a draft event carries `id = 0` until then. Events are immutable
/// after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Monotonic per-run sequence number (0 = unassigned draft).
    #[serde(default)]
    pub id: u64,
    /// The run this event belongs to.
    pub run_id: RunId,
    /// The node this event describes.
    pub node_ref: NodeRef,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: TraceEventType,
    /// Severity.
    #[serde(default)]
    pub level: EventLevel,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error payload, on `FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TraceError>,
    /// Elided output summary, on `COMPLETED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<Value>,
    /// Structured progress payload, on `PROGRESS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Correlation metadata.
    #[serde(default)]
    pub metadata: TraceMetadata,
}

impl TraceEvent {
    fn draft(run_id: RunId, node_ref: NodeRef, event_type: TraceEventType) -> Self {
        Self {
            id: 0,
            run_id,
            node_ref,
            event_type,
            level: EventLevel::Info,
            timestamp: Utc::now(),
            message: None,
            error: None,
            output_summary: None,
            data: None,
            metadata: TraceMetadata::default(),
        }
    }

    /// A `STARTED` event for an attempt.
    #[must_use]
    pub fn started(run_id: RunId, node_ref: NodeRef, attempt: u32) -> Self {
        let mut event = Self::draft(run_id, node_ref, TraceEventType::Started);
        event.metadata.attempt = Some(attempt);
        event
    }

    /// A `PROGRESS` event.
    #[must_use]
    pub fn progress(
        run_id: RunId,
        node_ref: NodeRef,
        level: EventLevel,
        message: impl Into<String>,
    ) -> Self {
        let mut event = Self::draft(run_id, node_ref, TraceEventType::Progress);
        event.level = level;
        event.message = Some(message.into());
        event
    }

    /// A `COMPLETED` event carrying an output summary.
    #[must_use]
    pub fn completed(run_id: RunId, node_ref: NodeRef, attempt: u32, summary: Value) -> Self {
        let mut event = Self::draft(run_id, node_ref, TraceEventType::Completed);
        event.metadata.attempt = Some(attempt);
        event.output_summary = Some(summary);
        event
    }

    /// A `FAILED` event.
    #[must_use]
    pub fn failed(run_id: RunId, node_ref: NodeRef, attempt: u32, error: TraceError) -> Self {
        let mut event = Self::draft(run_id, node_ref, TraceEventType::Failed);
        event.level = EventLevel::Error;
        event.message = Some(error.message.clone());
        event.metadata.attempt = Some(attempt);
        event.error = Some(error);
        event
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Merge metadata fields (non-`None` fields of `metadata` win).
    #[must_use]
    pub fn with_metadata(mut self, metadata: TraceMetadata) -> Self {
        let attempt = self.metadata.attempt;
        self.metadata = metadata;
        if self.metadata.attempt.is_none() {
            self.metadata.attempt = attempt;
        }
        self
    }
}

/// Bound long values for trace-event output summaries.
///
/// Strings keep their first 120 characters, arrays their first 16 elements;
/// objects recurse. The full payload lives in the node I/O record, the
/// summary is for stream consumers.
#[must_use]
pub fn summarize_output(value: &Value) -> Value {
    const MAX_STRING: usize = 120;
    const MAX_ITEMS: usize = 16;

    match value {
        Value::String(s) => {
            if s.chars().count() > MAX_STRING {
                let kept: String = s.chars().take(MAX_STRING).collect();
                Value::String(format!("{kept}… (+{} chars)", s.chars().count() - MAX_STRING))
            } else {
                value.clone()
            }
        }
        Value::Array(items) => {
            let mut kept: Vec<Value> = items.iter().take(MAX_ITEMS).map(summarize_output).collect();
            if items.len() > MAX_ITEMS {
                kept.push(Value::String(format!("… (+{} items)", items.len() - MAX_ITEMS)));
            }
            Value::Array(kept)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), summarize_output(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(s: &str) -> NodeRef {
        NodeRef::new(s).unwrap()
    }

    #[test]
    fn started_event_shape() {
        let event = TraceEvent::started(RunId::v4(), node("scan"), 2);
        assert_eq!(event.event_type, TraceEventType::Started);
        assert_eq!(event.metadata.attempt, Some(2));
        assert_eq!(event.level, EventLevel::Info);
        assert_eq!(event.id, 0);
    }

    #[test]
    fn progress_event_shape() {
        let event = TraceEvent::progress(RunId::v4(), node("scan"), EventLevel::Debug, "25%")
            .with_data(json!({"pct": 25}));
        assert_eq!(event.event_type, TraceEventType::Progress);
        assert_eq!(event.level, EventLevel::Debug);
        assert_eq!(event.message.as_deref(), Some("25%"));
        assert_eq!(event.data.unwrap()["pct"], 25);
    }

    #[test]
    fn completed_event_shape() {
        let event =
            TraceEvent::completed(RunId::v4(), node("scan"), 1, json!({"findings": 3}));
        assert!(event.event_type.is_terminal());
        assert_eq!(event.output_summary.unwrap()["findings"], 3);
    }

    #[test]
    fn failed_event_mirrors_error_message() {
        let event = TraceEvent::failed(
            RunId::v4(),
            node("scan"),
            3,
            TraceError {
                message: "dns failure".into(),
                kind: ErrorKind::Network,
                details: None,
            },
        );
        assert!(event.event_type.is_terminal());
        assert_eq!(event.level, EventLevel::Error);
        assert_eq!(event.message.as_deref(), Some("dns failure"));
        assert_eq!(event.error.unwrap().kind, ErrorKind::Network);
        assert_eq!(event.metadata.attempt, Some(3));
    }

    #[test]
    fn with_metadata_preserves_attempt() {
        let event = TraceEvent::started(RunId::v4(), node("n"), 4).with_metadata(TraceMetadata {
            stream_id: Some("s-1".into()),
            join_strategy: Some(JoinStrategy::Any),
            ..TraceMetadata::default()
        });
        assert_eq!(event.metadata.attempt, Some(4));
        assert_eq!(event.metadata.stream_id.as_deref(), Some("s-1"));
        assert_eq!(event.metadata.join_strategy, Some(JoinStrategy::Any));
    }

    #[test]
    fn metadata_attempt_wins_when_set() {
        let event = TraceEvent::started(RunId::v4(), node("n"), 4).with_metadata(TraceMetadata {
            attempt: Some(9),
            ..TraceMetadata::default()
        });
        assert_eq!(event.metadata.attempt, Some(9));
    }

    #[test]
    fn serde_wire_shape() {
        let event = TraceEvent::started(RunId::v4(), node("scan"), 1);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "STARTED");
        assert_eq!(json["level"], "info");
        assert_eq!(json["nodeRef"], "scan");
        assert_eq!(json["metadata"]["attempt"], 1);
    }

    #[test]
    fn serde_roundtrip() {
        let event = TraceEvent::failed(
            RunId::v4(),
            node("x"),
            1,
            TraceError {
                message: "boom".into(),
                kind: ErrorKind::Service,
                details: Some(json!({"status": 500})),
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: TraceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn summarize_truncates_long_strings() {
        let long = "x".repeat(500);
        let summary = summarize_output(&json!(long));
        let text = summary.as_str().unwrap();
        assert!(text.len() < 500);
        assert!(text.contains("(+380 chars)"));
    }

    #[test]
    fn summarize_truncates_long_arrays() {
        let items: Vec<i32> = (0..40).collect();
        let summary = summarize_output(&json!(items));
        let array = summary.as_array().unwrap();
        assert_eq!(array.len(), 17);
        assert_eq!(array[16], json!("… (+24 items)"));
    }

    #[test]
    fn summarize_recurses_into_objects() {
        let value = json!({"inner": {"long": "y".repeat(200)}, "n": 7});
        let summary = summarize_output(&value);
        assert_eq!(summary["n"], 7);
        assert!(summary["inner"]["long"].as_str().unwrap().contains("chars"));
    }

    #[test]
    fn summarize_leaves_short_values_alone() {
        let value = json!({"ok": true, "list": [1, 2, 3], "s": "short"});
        assert_eq!(summarize_output(&value), value);
    }
}
