//! The canonical compiled workflow definition.
//!
//! A definition is immutable once committed to a workflow version. The
//! orchestrator consumes it directly: actions are stored in a valid
//! topological order, `dependency_counts` seeds the scheduler's counters,
//! and `edge_kinds` carries the outcome routing.

use std::collections::HashMap;

use indexmap::IndexMap;
use palisade_core::NodeRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::{GraphEdge, GraphNode};

/// Definition format version emitted by this compiler.
pub const WORKFLOW_DEFINITION_VERSION: u32 = 2;

/// Outcome routing of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Followed when the source action succeeds.
    #[default]
    Success,
    /// Followed when the source action fails.
    Failure,
}

/// Fan-in dispatch policy for an action with multiple predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Dispatch once every predecessor has resolved.
    #[default]
    All,
    /// Dispatch on the first success; leave later peers running.
    Any,
    /// Dispatch on the first success; cancel in-flight peers.
    First,
}

/// One upstream source feeding a target input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSource {
    /// Ref of the upstream action.
    pub source_ref: NodeRef,
    /// Output port on the upstream action.
    pub source_handle: String,
}

/// One outgoing route of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRoute {
    /// Target action ref.
    pub to_ref: NodeRef,
    /// Outcome this route fires on.
    pub kind: EdgeKind,
}

/// The entrypoint marker of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Ref of the entrypoint action.
    #[serde(rename = "ref")]
    pub node_ref: NodeRef,
}

/// One compiled unit of execution, derived from one UI node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    /// Ref, equal to the originating node id.
    #[serde(rename = "ref")]
    pub node_ref: NodeRef,
    /// Component this action instantiates.
    pub component_id: String,
    /// Display label.
    pub label: String,
    /// Compiled parameter values.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Distinct refs of all predecessors, in first-edge order.
    #[serde(default)]
    pub depends_on: Vec<NodeRef>,
    /// Per-target-port upstream sources. A port has multiple sources only
    /// when it is list-typed (fan-in collection, topological order).
    #[serde(default)]
    pub input_mappings: IndexMap<String, Vec<InputSource>>,
    /// Outgoing routes, in edge declaration order.
    #[serde(default)]
    pub edge_kinds: Vec<EdgeRoute>,
    /// Fan-in dispatch policy.
    #[serde(default)]
    pub join_strategy: JoinStrategy,
    /// Per-action concurrency cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    /// Opaque stream correlation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    /// Opaque group correlation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl ActionDefinition {
    /// Number of distinct predecessors.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.depends_on.len()
    }

    /// Outgoing routes of the given kind.
    pub fn routes_of(&self, kind: EdgeKind) -> impl Iterator<Item = &EdgeRoute> {
        self.edge_kinds.iter().filter(move |r| r.kind == kind)
    }

    /// Returns `true` if any outgoing edge routes failures.
    #[must_use]
    pub fn has_failure_route(&self) -> bool {
        self.edge_kinds.iter().any(|r| r.kind == EdgeKind::Failure)
    }
}

/// The canonical compiled workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Workflow title (the submitted graph name).
    pub title: String,
    /// Definition format version.
    pub version: u32,
    /// The single entrypoint.
    pub entrypoint: EntryPoint,
    /// Actions in a valid topological order.
    pub actions: Vec<ActionDefinition>,
    /// Original UI nodes, preserved for the editor.
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Original edges, preserved for the editor.
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    /// Seed values for the scheduler's dependency counters, in action order.
    #[serde(default)]
    pub dependency_counts: IndexMap<NodeRef, usize>,
}

impl WorkflowDefinition {
    /// Number of actions.
    #[must_use]
    pub fn total_actions(&self) -> usize {
        self.actions.len()
    }

    /// Find an action by ref.
    #[must_use]
    pub fn action(&self, node_ref: &NodeRef) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| &a.node_ref == node_ref)
    }

    /// Inbound routes per action: for each ref, the `(from, kind)` pairs of
    /// edges targeting it, in upstream action order.
    #[must_use]
    pub fn inbound_routes(&self) -> HashMap<NodeRef, Vec<(NodeRef, EdgeKind)>> {
        let mut inbound: HashMap<NodeRef, Vec<(NodeRef, EdgeKind)>> = HashMap::new();
        for action in &self.actions {
            for route in &action.edge_kinds {
                inbound
                    .entry(route.to_ref.clone())
                    .or_default()
                    .push((action.node_ref.clone(), route.kind));
            }
        }
        inbound
    }

    /// Refs of actions with no outgoing success route (the workflow's exit
    /// actions, whose outputs form the run result).
    #[must_use]
    pub fn exit_refs(&self) -> Vec<NodeRef> {
        self.actions
            .iter()
            .filter(|a| a.routes_of(EdgeKind::Success).next().is_none())
            .map(|a| a.node_ref.clone())
            .collect()
    }
}
