//! The graph document the editor submits.
//!
//! Field names follow the submission wire format (camelCase); refs are
//! validated [`NodeRef`]s, everything else is carried opaquely.

use palisade_core::NodeRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::definition::{EdgeKind, JoinStrategy};

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Canvas viewport of the submitted graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
    /// Zoom factor.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Per-node configuration set in the editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Component parameter values.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Manual values pinned onto input ports.
    #[serde(default)]
    pub input_overrides: Map<String, Value>,
    /// Fan-in dispatch policy, when the node has multiple predecessors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_strategy: Option<JoinStrategy>,
    /// Opaque stream correlation tag, preserved into trace metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    /// Opaque group correlation tag, preserved into trace metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Per-action concurrency cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
}

/// Display payload of a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Editor configuration.
    #[serde(default)]
    pub config: NodeConfig,
}

/// One node of the submitted graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Opaque ref, unique within the graph.
    pub id: NodeRef,
    /// Component id this node instantiates.
    #[serde(rename = "type")]
    pub component_id: String,
    /// Canvas position.
    #[serde(default)]
    pub position: Position,
    /// Label and configuration.
    #[serde(default)]
    pub data: NodeData,
}

impl GraphNode {
    /// A node with empty config, for programmatic graph construction.
    #[must_use]
    pub fn new(id: NodeRef, component_id: impl Into<String>) -> Self {
        Self {
            id,
            component_id: component_id.into(),
            position: Position::default(),
            data: NodeData::default(),
        }
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    /// Set a parameter value.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.config.params.insert(key.into(), value);
        self
    }

    /// Pin a manual value onto an input port.
    #[must_use]
    pub fn with_input_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.config.input_overrides.insert(key.into(), value);
        self
    }

    /// Set the join strategy.
    #[must_use]
    pub fn with_join_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.data.config.join_strategy = Some(strategy);
        self
    }
}

/// One edge of the submitted graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Edge id, opaque.
    pub id: String,
    /// Source node ref.
    pub source: NodeRef,
    /// Target node ref.
    pub target: NodeRef,
    /// Output port on the source; defaults to its only output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input port on the target; defaults to its only input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Routing kind; `success` unless stated.
    #[serde(default)]
    pub kind: EdgeKind,
}

impl GraphEdge {
    /// A success edge between default handles.
    #[must_use]
    pub fn new(id: impl Into<String>, source: NodeRef, target: NodeRef) -> Self {
        Self {
            id: id.into(),
            source,
            target,
            source_handle: None,
            target_handle: None,
            kind: EdgeKind::Success,
        }
    }

    /// Set the source handle.
    #[must_use]
    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Set the target handle.
    #[must_use]
    pub fn to_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }

    /// Make this a failure-routing edge.
    #[must_use]
    pub fn on_failure(mut self) -> Self {
        self.kind = EdgeKind::Failure;
        self
    }
}

/// The full graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Workflow name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nodes, in declaration order.
    pub nodes: Vec<GraphNode>,
    /// Edges, in declaration order.
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    /// Canvas viewport.
    #[serde(default)]
    pub viewport: Viewport,
}

impl GraphSpec {
    /// An empty graph with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            viewport: Viewport::default(),
        }
    }

    /// Add a node.
    #[must_use]
    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an edge.
    #[must_use]
    pub fn with_edge(mut self, edge: GraphEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Find a node by ref.
    #[must_use]
    pub fn node(&self, id: &NodeRef) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn r(s: &str) -> NodeRef {
        NodeRef::new(s).unwrap()
    }

    #[test]
    fn node_builder() {
        let node = GraphNode::new(r("scan"), "tool.scanner")
            .with_label("Scan host")
            .with_param("depth", json!(3))
            .with_input_override("target", json!("10.0.0.1"))
            .with_join_strategy(JoinStrategy::Any);
        assert_eq!(node.component_id, "tool.scanner");
        assert_eq!(node.data.label, "Scan host");
        assert_eq!(node.data.config.params["depth"], 3);
        assert_eq!(node.data.config.input_overrides["target"], "10.0.0.1");
        assert_eq!(node.data.config.join_strategy, Some(JoinStrategy::Any));
    }

    #[test]
    fn edge_builder() {
        let edge = GraphEdge::new("e1", r("a"), r("b"))
            .from_handle("out")
            .to_handle("in")
            .on_failure();
        assert_eq!(edge.kind, EdgeKind::Failure);
        assert_eq!(edge.source_handle.as_deref(), Some("out"));
        assert_eq!(edge.target_handle.as_deref(), Some("in"));
    }

    #[test]
    fn edge_kind_defaults_to_success() {
        let edge: GraphEdge =
            serde_json::from_value(json!({"id": "e1", "source": "a", "target": "b"})).unwrap();
        assert_eq!(edge.kind, EdgeKind::Success);
    }

    #[test]
    fn graph_lookup() {
        let graph = GraphSpec::new("wf")
            .with_node(GraphNode::new(r("a"), "x"))
            .with_node(GraphNode::new(r("b"), "y"));
        assert!(graph.node(&r("a")).is_some());
        assert!(graph.node(&r("missing")).is_none());
    }

    #[test]
    fn submission_wire_format_parses() {
        let doc = json!({
            "name": "triage",
            "description": "IOC triage",
            "nodes": [
                {
                    "id": "trigger",
                    "type": "core.workflow.entrypoint",
                    "position": {"x": 0.0, "y": 0.0},
                    "data": {
                        "label": "Trigger",
                        "config": {
                            "params": {"outputs": {"ioc": {"type": "primitive", "name": "text"}}},
                            "inputOverrides": {},
                            "streamId": "s-1"
                        }
                    }
                },
                {
                    "id": "enrich",
                    "type": "tool.enricher",
                    "position": {"x": 200.0, "y": 0.0},
                    "data": {"label": "Enrich", "config": {"joinStrategy": "all"}}
                }
            ],
            "edges": [
                {"id": "e1", "source": "trigger", "target": "enrich",
                 "sourceHandle": "ioc", "targetHandle": "ioc", "kind": "success"}
            ],
            "viewport": {"x": 0.0, "y": 0.0, "zoom": 1.0}
        });
        let graph: GraphSpec = serde_json::from_value(doc).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].data.config.stream_id.as_deref(), Some("s-1"));
        assert_eq!(
            graph.nodes[1].data.config.join_strategy,
            Some(JoinStrategy::All)
        );
        assert_eq!(graph.edges[0].source_handle.as_deref(), Some("ioc"));
    }

    #[test]
    fn serde_roundtrip() {
        let graph = GraphSpec::new("wf")
            .with_node(GraphNode::new(r("a"), "x").with_param("k", json!(1)))
            .with_edge(GraphEdge::new("e1", r("a"), r("a")));
        let json = serde_json::to_string(&graph).unwrap();
        let back: GraphSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
    }

    #[test]
    fn overlong_node_id_is_rejected_at_parse() {
        let doc = json!({
            "name": "bad",
            "nodes": [{"id": "x".repeat(200), "type": "t"}],
            "edges": []
        });
        assert!(serde_json::from_value::<GraphSpec>(doc).is_err());
    }
}
