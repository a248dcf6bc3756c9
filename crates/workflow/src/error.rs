//! Compiler failure kinds.

use palisade_core::NodeRef;
use thiserror::Error;

/// Why a graph failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The graph has no nodes.
    #[error("graph contains no nodes")]
    EmptyGraph,

    /// Two nodes share a ref.
    #[error("duplicate node ref `{node_ref}`")]
    DuplicateNodeRef {
        /// The duplicated ref.
        node_ref: NodeRef,
    },

    /// A node names a component the registry does not know.
    #[error("component `{component_id}` for node `{node_ref}` is not registered")]
    ComponentNotRegistered {
        /// The unknown component id.
        component_id: String,
        /// The node that referenced it.
        node_ref: NodeRef,
    },

    /// An edge references a node that does not exist.
    #[error("edge `{edge_id}` references unknown node `{node_ref}`")]
    UnknownNode {
        /// The offending edge.
        edge_id: String,
        /// The missing ref, as submitted.
        node_ref: String,
    },

    /// An edge references a port that does not exist on the node.
    #[error("edge `{edge_id}`: node `{node_ref}` has no port `{port}`")]
    UnknownPort {
        /// The offending edge.
        edge_id: String,
        /// The node whose port is missing.
        node_ref: NodeRef,
        /// The missing port id.
        port: String,
    },

    /// An edge omitted its handle on a node with several candidate ports.
    #[error("edge `{edge_id}`: node `{node_ref}` has multiple ports, a handle is required")]
    AmbiguousPort {
        /// The offending edge.
        edge_id: String,
        /// The node with more than one candidate port.
        node_ref: NodeRef,
    },

    /// Source and target port types are incompatible.
    #[error(
        "edge `{edge_id}`: `{source_ref}.{source_handle}` ({source_type}) does not fit \
         `{target_ref}.{target_handle}` ({target_type})"
    )]
    PortTypeMismatch {
        /// The offending edge.
        edge_id: String,
        /// Source action ref.
        source_ref: NodeRef,
        /// Source port.
        source_handle: String,
        /// Source port type.
        source_type: String,
        /// Target action ref.
        target_ref: NodeRef,
        /// Target port.
        target_handle: String,
        /// Target port type.
        target_type: String,
    },

    /// A non-list target port has more than one inbound edge.
    #[error("node `{node_ref}` port `{port}` has multiple inbound edges")]
    MultipleEdgesToPort {
        /// The target node.
        node_ref: NodeRef,
        /// The over-subscribed port.
        port: String,
    },

    /// The graph contains a cycle.
    #[error("workflow graph contains a cycle")]
    WorkflowGraphContainsCycle,

    /// No entrypoint could be selected.
    #[error("no entrypoint node found")]
    EntrypointMissing,

    /// More than one candidate entrypoint.
    #[error("multiple entrypoint candidates found")]
    EntrypointAmbiguous,
}
