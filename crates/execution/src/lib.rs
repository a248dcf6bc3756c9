#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Execution
//!
//! Run-time state for workflows and their actions — this crate models
//! execution concepts, it does NOT contain the orchestrator. It defines:
//!
//! - [`RunStatus`] — the run-level state machine
//! - [`ActionState`] — the per-action state machine
//! - [`Run`] — the persisted run record with trigger, progress and failure
//! - [`NodeIoRecord`] — per-`(run, node, attempt)` I/O with spill references
//! - [`TraceEvent`] — the ordered per-run event stream element
//! - [`ActivityKey`] / [`SubmissionKey`] — idempotency keys
//! - Transition validation in the [`transition`] module

pub mod action_state;
pub mod error;
pub mod idempotency;
pub mod node_io;
pub mod run;
pub mod status;
pub mod trace;
pub mod transition;

pub use action_state::ActionState;
pub use error::ExecutionError;
pub use idempotency::{ActivityKey, SubmissionKey};
pub use node_io::{NodeIoRecord, NodeIoStatus, Payload};
pub use run::{NewRun, NodeOverride, Run, RunFailure, RunProgress, Trigger, TriggerType};
pub use status::RunStatus;
pub use trace::{TraceError, TraceEvent, TraceEventType, TraceMetadata, summarize_output};
