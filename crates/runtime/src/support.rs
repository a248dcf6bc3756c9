//! Worker-side implementations of the context ports.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use palisade_component::{ActivityLogger, ArtifactStore, ComponentError, SecretProvider};
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

/// Secret provider over a fixed map, loaded at worker startup.
///
/// The real secret store is an external collaborator; the core only needs
/// the lookup seam.
#[derive(Default)]
pub struct StaticSecrets {
    secrets: HashMap<String, SecretString>,
}

impl StaticSecrets {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    #[must_use]
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .insert(key.into(), SecretString::from(value.into()));
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecrets {
    async fn get(&self, key: &str) -> Result<SecretString, ComponentError> {
        self.secrets
            .get(key)
            .cloned()
            .ok_or_else(|| ComponentError::not_found(format!("secret `{key}` is not configured")))
    }
}

impl std::fmt::Debug for StaticSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys only; values must never appear in debug output.
        f.debug_struct("StaticSecrets")
            .field("keys", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// In-process artifact store.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    artifacts: DashMap<String, Bytes>,
}

impl MemoryArtifacts {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<String, ComponentError> {
        self.artifacts.insert(key.to_owned(), bytes);
        Ok(key.to_owned())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ComponentError> {
        self.artifacts
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ComponentError::not_found(format!("artifact `{key}` does not exist")))
    }
}

/// Activity logger forwarding into `tracing` under the `activity` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger;

impl ActivityLogger for TracingLogger {
    fn debug(&self, message: &str) {
        debug!(target: "activity", "{message}");
    }

    fn info(&self, message: &str) {
        info!(target: "activity", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "activity", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "activity", "{message}");
    }
}
