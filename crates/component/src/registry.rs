//! Component registry.
//!
//! The registry is built once at startup with [`RegistryBuilder`] and frozen
//! into an immutable [`ComponentRegistry`] shared across workers. Components
//! are keyed by their definition id; a component may additionally be reachable
//! under aliases (e.g. the entrypoint's legacy `entry-point` id).

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::Component;
use crate::definition::ComponentDefinition;

/// Init-time builder for the registry.
#[derive(Default)]
pub struct RegistryBuilder {
    components: HashMap<String, Arc<dyn Component>>,
    aliases: HashMap<String, String>,
}

impl RegistryBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component under its definition id. Overwrites a previous
    /// registration with the same id.
    #[must_use]
    pub fn register(mut self, component: Arc<dyn Component>) -> Self {
        let id = component.definition().id.clone();
        self.components.insert(id, component);
        self
    }

    /// Register an alias resolving to an already-registered id.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// Freeze into an immutable registry.
    #[must_use]
    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            components: self.components,
            aliases: self.aliases,
        }
    }
}

/// Immutable name→component lookup, read-only after startup.
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
    aliases: HashMap<String, String>,
}

impl ComponentRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a component by id or alias.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Component>> {
        if let Some(component) = self.components.get(id) {
            return Some(Arc::clone(component));
        }
        self.aliases
            .get(id)
            .and_then(|target| self.components.get(target))
            .map(Arc::clone)
    }

    /// Returns `true` if `id` resolves to a component (directly or via alias).
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
            || self
                .aliases
                .get(id)
                .is_some_and(|target| self.components.contains_key(target))
    }

    /// Definitions of all registered components, unordered.
    #[must_use]
    pub fn definitions(&self) -> Vec<&ComponentDefinition> {
        self.components.values().map(|c| c.definition()).collect()
    }

    /// Number of registered components (aliases not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("count", &self.components.len())
            .field("ids", &self.components.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .finish()
    }
}
