//! Blob storage seam for spilled payloads.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::StoreError;

/// Byte storage for payloads that exceed the inline threshold.
///
/// The production deployment points this at object storage; the core only
/// requires put/get by opaque key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key, overwriting any previous value.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError>;

    /// Retrieve bytes by key.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;
}

/// In-process blob store used by tests and the reference deployment.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.blobs.insert(key.to_owned(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::BlobMissing {
                key: key.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryBlobStore::new();
        store.put("k1", Bytes::from_static(b"payload")).await.unwrap();
        let bytes = store.get("k1").await.unwrap();
        assert_eq!(&bytes[..], b"payload");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_missing_errors() {
        let store = MemoryBlobStore::new();
        let err = store.get("absent").await.unwrap_err();
        assert!(matches!(err, StoreError::BlobMissing { key } if key == "absent"));
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = MemoryBlobStore::new();
        store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.put("k", Bytes::from_static(b"v2")).await.unwrap();
        assert_eq!(&store.get("k").await.unwrap()[..], b"v2");
        assert_eq!(store.len(), 1);
    }
}
