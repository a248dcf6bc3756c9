//! Payload spill policy.
//!
//! Encoded payloads above the threshold move to blob storage keyed by
//! `(run, node, attempt, port)`; the record keeps a [`Payload::Spilled`]
//! reference. Reads resolve the reference transparently, bounded by a
//! caller-supplied size ceiling.

use std::sync::Arc;

use bytes::Bytes;
use palisade_core::{NodeRef, RunId, clamp_spill_threshold};
use palisade_execution::Payload;
use serde_json::Value;
use tracing::debug;

use crate::blob::BlobStore;
use crate::error::StoreError;

/// Encodes payloads, spilling large ones to a [`BlobStore`].
#[derive(Clone)]
pub struct SpillPolicy {
    blob: Arc<dyn BlobStore>,
    threshold: usize,
}

impl SpillPolicy {
    /// A policy with the given threshold, clamped into the valid range.
    #[must_use]
    pub fn new(blob: Arc<dyn BlobStore>, threshold: usize) -> Self {
        Self {
            blob,
            threshold: clamp_spill_threshold(threshold),
        }
    }

    /// The effective threshold in bytes.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Blob key for a spilled payload.
    #[must_use]
    pub fn key_for(run_id: RunId, node_ref: &NodeRef, attempt: u32, port: &str) -> String {
        format!("runs/{run_id}/{node_ref}/{attempt}/{port}")
    }

    /// Encode a value into a payload, spilling when it exceeds the threshold.
    ///
    /// Returns the payload plus the encoded size in bytes.
    pub async fn store(
        &self,
        run_id: RunId,
        node_ref: &NodeRef,
        attempt: u32,
        port: &str,
        value: &Value,
    ) -> Result<(Payload, u64), StoreError> {
        let encoded = serde_json::to_vec(value)?;
        let size = encoded.len() as u64;
        if encoded.len() <= self.threshold {
            return Ok((Payload::inline(value.clone()), size));
        }

        let key = Self::key_for(run_id, node_ref, attempt, port);
        debug!(%run_id, %node_ref, attempt, port, size, "spilling payload to blob storage");
        self.blob.put(&key, Bytes::from(encoded)).await?;
        Ok((Payload::spilled(key, size), size))
    }

    /// Resolve a payload back into its value, refusing spilled payloads
    /// larger than `ceiling` bytes.
    pub async fn load(&self, payload: &Payload, ceiling: u64) -> Result<Value, StoreError> {
        match payload {
            Payload::Inline { value } => Ok(value.clone()),
            Payload::Spilled { key, size } => {
                if *size > ceiling {
                    return Err(StoreError::PayloadTooLarge {
                        size: *size,
                        ceiling,
                    });
                }
                let bytes = self.blob.get(key).await?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }
}

impl std::fmt::Debug for SpillPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillPolicy")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use palisade_core::{DEFAULT_SPILL_THRESHOLD, MAX_SPILL_THRESHOLD};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn policy(threshold: usize) -> (SpillPolicy, Arc<MemoryBlobStore>) {
        let blob = Arc::new(MemoryBlobStore::new());
        (SpillPolicy::new(Arc::clone(&blob) as _, threshold), blob)
    }

    fn node(s: &str) -> NodeRef {
        NodeRef::new(s).unwrap()
    }

    #[tokio::test]
    async fn small_payload_stays_inline() {
        let (policy, blob) = policy(1024);
        let (payload, size) = policy
            .store(RunId::v4(), &node("n"), 1, "outputs", &json!({"k": "v"}))
            .await
            .unwrap();
        assert!(!payload.is_spilled());
        assert!(size > 0);
        assert!(blob.is_empty());
    }

    #[tokio::test]
    async fn large_payload_spills() {
        let (policy, blob) = policy(1024);
        let run = RunId::v4();
        let big = json!({"data": "x".repeat(5000)});
        let (payload, size) = policy
            .store(run, &node("scan"), 2, "outputs", &big)
            .await
            .unwrap();
        assert!(payload.is_spilled());
        assert!(size > 1024);
        assert_eq!(blob.len(), 1);

        match &payload {
            Payload::Spilled { key, .. } => {
                assert_eq!(key, &format!("runs/{run}/scan/2/outputs"));
            }
            Payload::Inline { .. } => panic!("expected spill"),
        }
    }

    #[tokio::test]
    async fn load_resolves_spilled_payload() {
        let (policy, _blob) = policy(1024);
        let big = json!({"data": "y".repeat(5000)});
        let (payload, _) = policy
            .store(RunId::v4(), &node("n"), 1, "inputs", &big)
            .await
            .unwrap();
        let value = policy.load(&payload, u64::MAX).await.unwrap();
        assert_eq!(value, big);
    }

    #[tokio::test]
    async fn load_inline_ignores_ceiling() {
        let (policy, _blob) = policy(1024);
        let value = policy
            .load(&Payload::inline(json!(42)), 1)
            .await
            .unwrap();
        assert_eq!(value, json!(42));
    }

    #[tokio::test]
    async fn load_respects_ceiling() {
        let (policy, _blob) = policy(1024);
        let big = json!({"data": "z".repeat(5000)});
        let (payload, size) = policy
            .store(RunId::v4(), &node("n"), 1, "outputs", &big)
            .await
            .unwrap();
        let err = policy.load(&payload, size - 1).await.unwrap_err();
        assert!(matches!(err, StoreError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn load_missing_blob_errors() {
        let (policy, _blob) = policy(1024);
        let err = policy
            .load(&Payload::spilled("runs/gone", 10), u64::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BlobMissing { .. }));
    }

    #[test]
    fn threshold_is_clamped() {
        let blob = Arc::new(MemoryBlobStore::new());
        assert_eq!(
            SpillPolicy::new(Arc::clone(&blob) as _, 0).threshold(),
            DEFAULT_SPILL_THRESHOLD
        );
        assert_eq!(
            SpillPolicy::new(blob as _, usize::MAX).threshold(),
            MAX_SPILL_THRESHOLD
        );
    }
}
