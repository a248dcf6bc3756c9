#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Store
//!
//! The execution store: the canonical persistence seam for runs, node I/O
//! records and the per-run trace event log.
//!
//! - [`ExecutionStore`] — the async trait the orchestrator writes through;
//!   any append-only backend with range queries can implement it
//! - [`MemoryStore`] — the in-process reference implementation
//! - [`BlobStore`] / [`SpillPolicy`] — payloads larger than the spill
//!   threshold move to blob storage, records keep a reference
//!
//! Every write is idempotent under the `(run, node, attempt)` key; an
//! `append_events` call lands all of its events or none, and event ids are
//! strictly increasing and gap-free per run.

pub mod blob;
pub mod error;
pub mod memory;
pub mod spill;
pub mod store;

pub use blob::{BlobStore, MemoryBlobStore};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use spill::SpillPolicy;
pub use store::{EventPage, ExecutionStore, RunFilter};
