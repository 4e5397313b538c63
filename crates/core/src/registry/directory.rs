//! In-memory implementation of RegistryDirectory.
//!
//! Providers receive the directory at construction instead of reaching for
//! process-wide state.

use moldserve_api::{Registry, RegistryDirectory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe name → registry map
pub struct InMemoryRegistryDirectory {
    registries: RwLock<HashMap<String, Arc<dyn Registry>>>,
}

impl InMemoryRegistryDirectory {
    pub fn new() -> Self {
        Self {
            registries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a registry under its own name, replacing any previous one.
    pub fn register(&self, registry: Arc<dyn Registry>) {
        let mut registries = self
            .registries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registries.insert(registry.name().to_string(), registry);
    }

    /// Register multiple registries at once
    pub fn register_batch(&self, entries: impl IntoIterator<Item = Arc<dyn Registry>>) {
        let mut registries = self
            .registries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for registry in entries {
            registries.insert(registry.name().to_string(), registry);
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Registry>> {
        let mut registries = self
            .registries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registries.remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let registries = self
            .registries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = registries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRegistryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryDirectory for InMemoryRegistryDirectory {
    fn get(&self, name: &str) -> Option<Arc<dyn Registry>> {
        let registries = self
            .registries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registries.get(name).cloned()
    }
}
