//! Bus errors.

use thiserror::Error;

/// Errors surfaced to bus writers and readers.
#[derive(Debug, Error)]
pub enum BusError {
    /// The reader fell behind the channel capacity and was dropped.
    ///
    /// Re-attach with a replay reader from the last seen cursor.
    #[error("live session evicted after missing {missed} events")]
    Evicted {
        /// How many events the reader missed.
        missed: u64,
    },

    /// Persisting a batch failed; nothing was broadcast.
    #[error(transparent)]
    Store(#[from] palisade_store::StoreError),
}
