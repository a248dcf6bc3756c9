//! Runtime infrastructure errors.
//!
//! Component failures travel as
//! [`ComponentError`](palisade_component::ComponentError) inside the
//! activity outcome; this type covers the runtime's own plumbing — store
//! writes and bus publishes that fail underneath an activity.

use thiserror::Error;

/// Infrastructure failure inside the activity runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A store write failed.
    #[error(transparent)]
    Store(#[from] palisade_store::StoreError),

    /// A trace publish failed.
    #[error(transparent)]
    Bus(#[from] palisade_eventbus::BusError),
}
