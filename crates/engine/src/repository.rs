//! Published workflow versions.
//!
//! A compiled definition becomes immutable the moment it is published; the
//! orchestrator only ever reads. Resolution is by `latest` or by a specific
//! version id (the two `versionStrategy` values of the sub-workflow call).

use std::sync::Arc;

use dashmap::DashMap;
use palisade_core::{WorkflowId, WorkflowVersionId};
use palisade_workflow::WorkflowDefinition;

use crate::dispatch::VersionSelector;
use crate::error::EngineError;

/// One published, immutable workflow version.
#[derive(Debug, Clone)]
pub struct PublishedVersion {
    /// The workflow.
    pub workflow_id: WorkflowId,
    /// Identity of this version.
    pub version_id: WorkflowVersionId,
    /// Monotonic version number, starting at 1.
    pub version: u32,
    /// The compiled definition.
    pub definition: Arc<WorkflowDefinition>,
}

/// In-memory version registry.
pub struct WorkflowRepository {
    versions: DashMap<WorkflowId, Vec<PublishedVersion>>,
    by_version_id: DashMap<WorkflowVersionId, PublishedVersion>,
}

impl WorkflowRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            versions: DashMap::new(),
            by_version_id: DashMap::new(),
        }
    }

    /// Publish a definition as the next version of `workflow_id`.
    pub fn publish(
        &self,
        workflow_id: WorkflowId,
        definition: WorkflowDefinition,
    ) -> PublishedVersion {
        let mut entry = self.versions.entry(workflow_id).or_default();
        let version = entry.len() as u32 + 1;
        let published = PublishedVersion {
            workflow_id,
            version_id: WorkflowVersionId::v4(),
            version,
            definition: Arc::new(definition),
        };
        entry.push(published.clone());
        self.by_version_id
            .insert(published.version_id, published.clone());
        published
    }

    /// The most recent version of a workflow.
    pub fn latest(&self, workflow_id: WorkflowId) -> Result<PublishedVersion, EngineError> {
        self.versions
            .get(&workflow_id)
            .and_then(|versions| versions.last().cloned())
            .ok_or(EngineError::DefinitionNotFound { workflow_id })
    }

    /// A specific version number of a workflow.
    pub fn by_version(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<PublishedVersion, EngineError> {
        let versions = self
            .versions
            .get(&workflow_id)
            .ok_or(EngineError::DefinitionNotFound { workflow_id })?;
        versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or(EngineError::VersionNotFound {
                workflow_id,
                version,
            })
    }

    /// A version by its id.
    pub fn by_version_id(
        &self,
        version_id: WorkflowVersionId,
    ) -> Result<PublishedVersion, EngineError> {
        self.by_version_id
            .get(&version_id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::VersionIdNotFound { version_id })
    }

    /// Resolve a selector against a workflow.
    pub fn resolve(
        &self,
        workflow_id: WorkflowId,
        selector: &VersionSelector,
    ) -> Result<PublishedVersion, EngineError> {
        match selector {
            VersionSelector::Latest => self.latest(workflow_id),
            VersionSelector::Number(version) => self.by_version(workflow_id, *version),
            VersionSelector::Id(version_id) => {
                let published = self.by_version_id(*version_id)?;
                if published.workflow_id != workflow_id {
                    return Err(EngineError::VersionIdNotFound {
                        version_id: *version_id,
                    });
                }
                Ok(published)
            }
        }
    }
}

impl Default for WorkflowRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRepository")
            .field("workflows", &self.versions.len())
            .field("versions", &self.by_version_id.len())
            .finish()
    }
}
