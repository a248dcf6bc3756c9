#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Workflow
//!
//! The shape of a submitted graph, the canonical compiled definition, and
//! the compiler that lowers one into the other.
//!
//! - [`GraphSpec`] — what the editor submits: nodes, edges, viewport
//! - [`WorkflowDefinition`] — the canonical, immutable execution definition:
//!   topologically-ordered actions, input mappings, edge routing, dependency
//!   counts
//! - [`Compiler`] — the deterministic single pass that validates the graph
//!   (registry resolution, port type checking, cycle detection, entrypoint
//!   selection) and produces the definition
//!
//! Compiling the same graph twice yields byte-identical output — every
//! collection in the definition preserves declaration order.

pub mod compile;
pub mod definition;
pub mod error;
pub mod graph;

pub use compile::Compiler;
pub use definition::{
    ActionDefinition, EdgeKind, EdgeRoute, EntryPoint, InputSource, JoinStrategy,
    WORKFLOW_DEFINITION_VERSION, WorkflowDefinition,
};
pub use error::CompileError;
pub use graph::{GraphEdge, GraphNode, GraphSpec, NodeConfig, NodeData, Position, Viewport};
