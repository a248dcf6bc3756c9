#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Core
//!
//! Core identifiers and shared vocabulary for the Palisade workflow core.
//! This crate provides the fundamental building blocks used by all other
//! Palisade crates.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`RunId`], [`WorkflowId`], [`WorkflowVersionId`],
//!   [`ActivityId`] — strongly-typed UUIDs
//! - **Node references**: [`NodeRef`] — the bounded, opaque ref that names a
//!   node/action within one workflow
//! - **Error taxonomy**: [`ErrorKind`] — the closed classification every
//!   activity failure maps into
//! - **Limits**: shared size bounds (ref lengths, spill thresholds, list caps)

pub mod id;
pub mod kind;
pub mod level;
pub mod limits;
pub mod node_ref;

pub use id::*;
pub use kind::ErrorKind;
pub use level::EventLevel;
pub use limits::*;
pub use node_ref::{NodeRef, NodeRefError};
