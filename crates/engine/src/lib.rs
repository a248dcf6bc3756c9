#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Engine
//!
//! The workflow orchestrator: a single-writer-per-run scheduler with
//! parallel child activities.
//!
//! - [`Engine`] — owns the registry, store, bus and activity runtime;
//!   `submit` starts a run and returns a [`RunHandle`]
//! - [`scheduler`] — the per-run loop: dependency counters, join
//!   strategies, success/failure edge routing, skip propagation,
//!   cancel/terminate with a grace window, run timeout, durable progress
//! - [`WorkflowRepository`] — immutable compiled versions, resolved by
//!   `latest` or a specific version id
//! - [`Worker`] — a task-queue-named host for concurrent runs with
//!   graceful shutdown
//! - [`WorkerSettings`] — environment-driven configuration

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod settings;
pub mod worker;

pub use dispatch::{RunRequest, VersionSelector};
pub use engine::{Engine, RunCompletion, RunHandle};
pub use error::EngineError;
pub use repository::{PublishedVersion, WorkflowRepository};
pub use settings::WorkerSettings;
pub use worker::Worker;
