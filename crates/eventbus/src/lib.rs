#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Eventbus
//!
//! The per-run trace channel. Writers (the orchestrator and the activity
//! runtime) publish through [`TraceBus`], which persists every batch to the
//! execution store — where ids are assigned — and then fans the same events
//! out to live subscribers in id order.
//!
//! Guarantees:
//!
//! - any reader observes events in the total order assigned at append;
//! - if a reader sees event `n`, it saw `n−1` first (gap-free), whether the
//!   events came from replay or the live channel;
//! - a reader that falls behind the channel capacity is evicted
//!   ([`BusError::Evicted`]) — it is never shown a reordering.
//!
//! Durability belongs to the store; the bus itself is purely in-memory.

pub mod bus;
pub mod error;
pub mod reader;

pub use bus::{BusSubscription, TraceBus};
pub use error::BusError;
pub use reader::EventReader;
