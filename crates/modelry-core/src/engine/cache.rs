//! Per-entity "all instances" cache.

use crate::instance::Instance;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Caches the full instance list of each entity type.
///
/// Entries are filled lazily by [`Engine::all`](crate::Engine::all) and dropped on every
/// mutation of their type; they are never written to directly.
#[derive(Debug, Default)]
pub struct InstanceCache {
    entries: Mutex<HashMap<String, Arc<Vec<Instance>>>>,
}

impl InstanceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instances of an entity type.
    pub fn get(&self, entity: &str) -> Option<Arc<Vec<Instance>>> {
        let hit = self.entries.lock().get(&entity.to_lowercase()).cloned();
        debug!(entity, hit = hit.is_some(), "all-instances cache lookup");
        hit
    }

    /// Store the instances of an entity type.
    pub fn insert(&self, entity: &str, instances: Vec<Instance>) -> Arc<Vec<Instance>> {
        let instances = Arc::new(instances);
        self.entries
            .lock()
            .insert(entity.to_lowercase(), Arc::clone(&instances));
        instances
    }

    /// Drop the entry of one entity type.
    pub fn invalidate(&self, entity: &str) {
        if self.entries.lock().remove(&entity.to_lowercase()).is_some() {
            debug!(entity, "all-instances cache invalidated");
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Check if an entity type is cached.
    pub fn contains(&self, entity: &str) -> bool {
        self.entries.lock().contains_key(&entity.to_lowercase())
    }

    /// Number of cached entity types.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, ScalarType};

    #[test]
    fn test_invalidate_is_case_insensitive() {
        let def = Arc::new(EntityDef::new("Pet").with_field(FieldDef::new("id", ScalarType::Int)));
        let cache = InstanceCache::new();

        let stored = cache.insert("Pet", vec![Instance::new(def)]);
        assert_eq!(stored.len(), 1);
        assert!(cache.contains("pet"));
        assert_eq!(cache.get("PET").unwrap().len(), 1);

        cache.invalidate("pet");
        assert!(cache.get("Pet").is_none());
        assert!(cache.is_empty());
    }
}
