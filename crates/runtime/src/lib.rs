#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Runtime
//!
//! The activity side of execution: everything that happens between "the
//! orchestrator decided to run this action" and "the action has an outcome".
//!
//! - [`routing`] — choose a value for every declared input port (routed
//!   upstream output vs manual override, by `value_priority`), apply the
//!   coercion table, fall back to defaults, fail `ValidationError` on
//!   missing required values
//! - [`runner`] — dispatch inline or to a container speaking the JSON
//!   stdin / NDJSON stdout wire format
//! - [`ActivityRuntime`] — the attempt loop: trace `STARTED` / `PROGRESS` /
//!   `COMPLETED` / `FAILED`, node I/O persistence with payload spill, retry
//!   backoff with non-retryable short-circuit, cooperative cancellation
//! - [`ReqwestHttp`] and the support ports ([`StaticSecrets`],
//!   [`MemoryArtifacts`], [`TracingLogger`]) the worker wires into contexts

pub mod activity;
pub mod error;
pub mod http;
pub mod routing;
pub mod runner;
pub mod support;

pub use activity::{ActivityOutcome, ActivityRequest, ActivityRuntime};
pub use error::RuntimeError;
pub use http::ReqwestHttp;
pub use routing::{RoutedInputs, route_inputs};
pub use support::{MemoryArtifacts, StaticSecrets, TracingLogger};
