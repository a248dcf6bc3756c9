//! The graph compiler.
//!
//! A deterministic single pass: resolve components, compute effective port
//! schemas, type-check every edge, reject cycles, select the entrypoint,
//! and emit actions in a topological order with declaration-order
//! tie-breaking — compiling the same graph twice is byte-identical.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use palisade_component::builtin::{ENTRYPOINT_ALIAS, ENTRYPOINT_COMPONENT_ID};
use palisade_component::{Component, ComponentRegistry};
use palisade_core::NodeRef;
use palisade_ports::{PortSet, PortSpec};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::sync::Arc;

use crate::definition::{
    ActionDefinition, EdgeKind, EdgeRoute, EntryPoint, InputSource, JoinStrategy,
    WORKFLOW_DEFINITION_VERSION, WorkflowDefinition,
};
use crate::error::CompileError;
use crate::graph::GraphSpec;

/// Compiles submitted graphs against a component registry.
pub struct Compiler<'a> {
    registry: &'a ComponentRegistry,
}

/// Per-node state resolved during the first pass.
struct ResolvedNode {
    component: Arc<dyn Component>,
    inputs: PortSet,
    outputs: PortSet,
}

impl<'a> Compiler<'a> {
    /// A compiler over the given registry.
    #[must_use]
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Lower a graph into the canonical workflow definition.
    pub fn compile(&self, graph: &GraphSpec) -> Result<WorkflowDefinition, CompileError> {
        if graph.nodes.is_empty() {
            return Err(CompileError::EmptyGraph);
        }

        let index_of = self.index_nodes(graph)?;
        let resolved = self.resolve_components(graph)?;
        let handles = self.check_edges(graph, &index_of, &resolved)?;
        let order = topological_order(graph, &index_of)?;
        let entrypoint = self.select_entrypoint(graph, &index_of)?;

        let topo_pos: HashMap<NodeRef, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (graph.nodes[idx].id.clone(), pos))
            .collect();

        let mut actions = Vec::with_capacity(graph.nodes.len());
        let mut dependency_counts = IndexMap::with_capacity(graph.nodes.len());
        for &idx in &order {
            let node = &graph.nodes[idx];
            let action = build_action(graph, node, &resolved, &handles, &topo_pos);
            dependency_counts.insert(action.node_ref.clone(), action.dependency_count());
            actions.push(action);
        }

        Ok(WorkflowDefinition {
            title: graph.name.clone(),
            version: WORKFLOW_DEFINITION_VERSION,
            entrypoint: EntryPoint {
                node_ref: entrypoint,
            },
            actions,
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
            dependency_counts,
        })
    }

    /// Map refs to declaration indices, rejecting duplicates.
    fn index_nodes(&self, graph: &GraphSpec) -> Result<HashMap<NodeRef, usize>, CompileError> {
        let mut index_of = HashMap::with_capacity(graph.nodes.len());
        for (idx, node) in graph.nodes.iter().enumerate() {
            if index_of.insert(node.id.clone(), idx).is_some() {
                return Err(CompileError::DuplicateNodeRef {
                    node_ref: node.id.clone(),
                });
            }
        }
        Ok(index_of)
    }

    /// Resolve every node's component and effective port schemas.
    fn resolve_components(
        &self,
        graph: &GraphSpec,
    ) -> Result<HashMap<NodeRef, ResolvedNode>, CompileError> {
        let mut resolved = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let component = self.registry.get(&node.component_id).ok_or_else(|| {
                CompileError::ComponentNotRegistered {
                    component_id: node.component_id.clone(),
                    node_ref: node.id.clone(),
                }
            })?;

            let definition = component.definition();
            let (inputs, outputs) = match component.resolve_ports(&node.data.config.params) {
                Some(ports) => (ports.inputs, ports.outputs),
                None => (definition.inputs.clone(), definition.outputs.clone()),
            };

            resolved.insert(
                node.id.clone(),
                ResolvedNode {
                    component,
                    inputs,
                    outputs,
                },
            );
        }
        Ok(resolved)
    }

    /// Validate edge endpoints, port existence, type compatibility and the
    /// one-edge-per-port rule. Returns the resolved `(source, target)`
    /// handles per edge id for the action-building pass.
    fn check_edges(
        &self,
        graph: &GraphSpec,
        index_of: &HashMap<NodeRef, usize>,
        resolved: &HashMap<NodeRef, ResolvedNode>,
    ) -> Result<HashMap<String, (String, String)>, CompileError> {
        let mut inbound_per_port: HashMap<(NodeRef, String), usize> = HashMap::new();
        let mut handles = HashMap::with_capacity(graph.edges.len());

        for edge in &graph.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !index_of.contains_key(endpoint) {
                    return Err(CompileError::UnknownNode {
                        edge_id: edge.id.clone(),
                        node_ref: endpoint.to_string(),
                    });
                }
            }

            let source = &resolved[&edge.source];
            let target = &resolved[&edge.target];
            let (source_handle, source_port) =
                resolve_handle(&edge.id, &edge.source, edge.source_handle.as_deref(), &source.outputs)?;
            let (target_handle, target_port) =
                resolve_handle(&edge.id, &edge.target, edge.target_handle.as_deref(), &target.inputs)?;

            if !target_port.schema.accepts(&source_port.schema) {
                return Err(CompileError::PortTypeMismatch {
                    edge_id: edge.id.clone(),
                    source_ref: edge.source.clone(),
                    source_handle: source_handle.to_owned(),
                    source_type: source_port.schema.to_string(),
                    target_ref: edge.target.clone(),
                    target_handle: target_handle.to_owned(),
                    target_type: target_port.schema.to_string(),
                });
            }

            let slot = (edge.target.clone(), target_handle.to_owned());
            let count = inbound_per_port.entry(slot).or_insert(0);
            *count += 1;
            // Fan-in into one port is only legal when the port collects a list.
            if *count > 1 && !target_port.schema.is_list() {
                return Err(CompileError::MultipleEdgesToPort {
                    node_ref: edge.target.clone(),
                    port: target_handle.to_owned(),
                });
            }

            handles.insert(
                edge.id.clone(),
                (source_handle.to_owned(), target_handle.to_owned()),
            );
        }
        Ok(handles)
    }

    /// Select the entrypoint: exactly one node of the entrypoint component,
    /// or implicitly the single node without inbound edges.
    fn select_entrypoint(
        &self,
        graph: &GraphSpec,
        index_of: &HashMap<NodeRef, usize>,
    ) -> Result<NodeRef, CompileError> {
        let explicit: Vec<&NodeRef> = graph
            .nodes
            .iter()
            .filter(|n| {
                n.component_id == ENTRYPOINT_COMPONENT_ID || n.component_id == ENTRYPOINT_ALIAS
            })
            .map(|n| &n.id)
            .collect();

        match explicit.as_slice() {
            [single] => return Ok((*single).clone()),
            [] => {}
            _ => return Err(CompileError::EntrypointAmbiguous),
        }

        let mut has_inbound = vec![false; graph.nodes.len()];
        for edge in &graph.edges {
            has_inbound[index_of[&edge.target]] = true;
        }
        let roots: Vec<&NodeRef> = graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(idx, _)| !has_inbound[*idx])
            .map(|(_, n)| &n.id)
            .collect();

        match roots.as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(CompileError::EntrypointMissing),
            _ => Err(CompileError::EntrypointAmbiguous),
        }
    }
}

/// Resolve an optional edge handle against a port set.
///
/// A missing handle binds to the node's only port; zero or several candidate
/// ports without a handle are errors.
fn resolve_handle<'p>(
    edge_id: &str,
    node_ref: &NodeRef,
    handle: Option<&str>,
    ports: &'p PortSet,
) -> Result<(&'p str, &'p PortSpec), CompileError> {
    if let Some(handle) = handle {
        return ports
            .get_key_value(handle)
            .map(|(key, spec)| (key.as_str(), spec))
            .ok_or_else(|| CompileError::UnknownPort {
                edge_id: edge_id.to_owned(),
                node_ref: node_ref.clone(),
                port: handle.to_owned(),
            });
    }

    let mut candidates = ports.iter();
    match (candidates.next(), candidates.next()) {
        (Some((key, spec)), None) => Ok((key.as_str(), spec)),
        (None, _) => Err(CompileError::UnknownPort {
            edge_id: edge_id.to_owned(),
            node_ref: node_ref.clone(),
            port: "(default)".to_owned(),
        }),
        (Some(_), Some(_)) => Err(CompileError::AmbiguousPort {
            edge_id: edge_id.to_owned(),
            node_ref: node_ref.clone(),
        }),
    }
}

/// Topological order over declaration indices.
///
/// The graph lives in a petgraph [`DiGraph`]; ordering is Kahn's algorithm
/// with the ready set keyed by declaration index, so ties resolve in
/// declaration order and the result is stable across compilations.
fn topological_order(
    graph: &GraphSpec,
    index_of: &HashMap<NodeRef, usize>,
) -> Result<Vec<usize>, CompileError> {
    let mut dag = DiGraph::<usize, ()>::with_capacity(graph.nodes.len(), graph.edges.len());
    let indices: Vec<NodeIndex> = (0..graph.nodes.len()).map(|i| dag.add_node(i)).collect();

    let mut seen_pairs = BTreeSet::new();
    for edge in &graph.edges {
        let source = index_of[&edge.source];
        let target = index_of[&edge.target];
        // Parallel edges between the same pair collapse to one dependency.
        if seen_pairs.insert((source, target)) {
            dag.add_edge(indices[source], indices[target], ());
        }
    }

    let mut in_degree: Vec<usize> = indices
        .iter()
        .map(|&idx| dag.neighbors_directed(idx, Direction::Incoming).count())
        .collect();

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        order.push(next);
        for succ in dag.neighbors_directed(indices[next], Direction::Outgoing) {
            let succ = dag[succ];
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() < graph.nodes.len() {
        return Err(CompileError::WorkflowGraphContainsCycle);
    }
    Ok(order)
}

/// Build one action from a validated node.
fn build_action(
    graph: &GraphSpec,
    node: &crate::graph::GraphNode,
    resolved: &HashMap<NodeRef, ResolvedNode>,
    handles: &HashMap<String, (String, String)>,
    topo_pos: &HashMap<NodeRef, usize>,
) -> ActionDefinition {
    let config = &node.data.config;
    let node_resolved = &resolved[&node.id];

    let mut depends_on: Vec<NodeRef> = Vec::new();
    let mut input_mappings: IndexMap<String, Vec<InputSource>> = IndexMap::new();
    for edge in graph.edges.iter().filter(|e| e.target == node.id) {
        if !depends_on.contains(&edge.source) {
            depends_on.push(edge.source.clone());
        }
        if let Some((source_handle, target_handle)) = handles.get(&edge.id) {
            input_mappings
                .entry(target_handle.clone())
                .or_default()
                .push(InputSource {
                    source_ref: edge.source.clone(),
                    source_handle: source_handle.clone(),
                });
        }
    }
    // Fan-in collections are consumed in topological order.
    for sources in input_mappings.values_mut() {
        sources.sort_by_key(|s| topo_pos.get(&s.source_ref).copied().unwrap_or(usize::MAX));
    }

    let edge_kinds = graph
        .edges
        .iter()
        .filter(|e| e.source == node.id)
        .map(|e| EdgeRoute {
            to_ref: e.target.clone(),
            kind: e.kind,
        })
        .collect();

    let label = if node.data.label.is_empty() {
        node_resolved.component.definition().label.clone()
    } else {
        node.data.label.clone()
    };

    ActionDefinition {
        node_ref: node.id.clone(),
        component_id: node.component_id.clone(),
        label,
        params: config.params.clone(),
        depends_on,
        input_mappings,
        edge_kinds,
        join_strategy: config.join_strategy.unwrap_or_default(),
        max_concurrency: config.max_concurrency,
        stream_id: config.stream_id.clone(),
        group_id: config.group_id.clone(),
    }
}
