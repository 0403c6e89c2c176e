//! Memoisation of rendered strings.
//!
//! Entries are keyed by instance handle and template. Whether attribute writes change the
//! key is decided by [`RenderCachePolicy`].

use crate::instance::{Instance, InstanceHandle};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// How rendered strings are memoised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderCachePolicy {
    /// Key on handle and template only. A later mutation keeps returning the first rendering
    /// until the entry is invalidated.
    Snapshot,
    /// Key on handle, template and instance revision, so mutations re-render.
    #[default]
    Revision,
    /// Never cache.
    Disabled,
}

/// Cache key for a rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    handle: InstanceHandle,
    revision: Option<u64>,
    template: Option<String>,
}

impl RenderKey {
    /// Build the key for an instance under the given policy.
    ///
    /// Returns `None` when the policy disables caching.
    pub fn for_instance(
        policy: RenderCachePolicy,
        instance: &Instance,
        template: Option<&str>,
    ) -> Option<Self> {
        let revision = match policy {
            RenderCachePolicy::Disabled => return None,
            RenderCachePolicy::Snapshot => None,
            RenderCachePolicy::Revision => Some(instance.revision()),
        };
        Some(Self {
            handle: instance.handle(),
            revision,
            template: template.map(str::to_string),
        })
    }

    /// Handle of the rendered instance.
    pub fn handle(&self) -> InstanceHandle {
        self.handle
    }
}

#[derive(Debug)]
struct CachedRender {
    text: String,
    seq: u64,
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(AtomicOrdering::Relaxed)
    }

    /// Get eviction count.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(AtomicOrdering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Bounded render cache; the oldest entry is evicted when full.
pub struct RenderCache {
    cache: RwLock<HashMap<RenderKey, CachedRender>>,
    max_entries: usize,
    next_seq: AtomicU64,
    stats: CacheStats,
}

impl RenderCache {
    /// Create a new cache holding at most `max_entries` renderings.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_entries,
            next_seq: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    /// Look up a rendering.
    pub fn get(&self, key: &RenderKey) -> Option<String> {
        let guard = self.cache.read();
        match guard.get(key) {
            Some(cached) => {
                self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed);
                Some(cached.text.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, AtomicOrdering::Relaxed);
                None
            }
        }
    }

    /// Store a rendering, evicting the oldest entry if at capacity.
    pub fn insert(&self, key: RenderKey, text: String) {
        if self.max_entries == 0 {
            return;
        }
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        let mut guard = self.cache.write();

        if guard.len() >= self.max_entries && !guard.contains_key(&key) {
            Self::evict_oldest(&mut guard);
            self.stats.evictions.fetch_add(1, AtomicOrdering::Relaxed);
        }

        guard.insert(key, CachedRender { text, seq });
    }

    /// Drop every rendering of one instance.
    pub fn invalidate(&self, handle: InstanceHandle) {
        self.cache.write().retain(|k, _| k.handle != handle);
    }

    fn evict_oldest(cache: &mut HashMap<RenderKey, CachedRender>) {
        let oldest = cache
            .iter()
            .min_by_key(|(_, v)| v.seq)
            .map(|(k, _)| k.clone());

        if let Some(key) = oldest {
            cache.remove(&key);
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get the current number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, ScalarType};
    use std::sync::Arc;

    fn instance() -> Instance {
        Instance::new(Arc::new(
            EntityDef::new("Pet")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text)),
        ))
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = RenderCache::new(10);
        let inst = instance();
        let key = RenderKey::for_instance(RenderCachePolicy::Snapshot, &inst, Some("$name")).unwrap();

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), "Rex".into());
        assert_eq!(cache.get(&key).as_deref(), Some("Rex"));

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_template_is_part_of_key() {
        let inst = instance();
        let a = RenderKey::for_instance(RenderCachePolicy::Snapshot, &inst, Some("a"));
        let b = RenderKey::for_instance(RenderCachePolicy::Snapshot, &inst, Some("b"));
        let none = RenderKey::for_instance(RenderCachePolicy::Snapshot, &inst, None);

        assert_ne!(a, b);
        assert_ne!(a, none);
    }

    #[test]
    fn test_revision_policy_tracks_mutation() {
        let mut inst = instance();
        let before = RenderKey::for_instance(RenderCachePolicy::Revision, &inst, None);
        let snapshot_before = RenderKey::for_instance(RenderCachePolicy::Snapshot, &inst, None);

        inst.set("name", "Rex".into()).unwrap();

        assert_ne!(before, RenderKey::for_instance(RenderCachePolicy::Revision, &inst, None));
        assert_eq!(
            snapshot_before,
            RenderKey::for_instance(RenderCachePolicy::Snapshot, &inst, None)
        );
    }

    #[test]
    fn test_disabled_policy_has_no_key() {
        assert!(RenderKey::for_instance(RenderCachePolicy::Disabled, &instance(), None).is_none());
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let cache = RenderCache::new(2);
        let keys: Vec<_> = (0..3)
            .map(|_| RenderKey::for_instance(RenderCachePolicy::Snapshot, &instance(), None).unwrap())
            .collect();

        for (i, key) in keys.iter().enumerate() {
            cache.insert(key.clone(), i.to_string());
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions(), 1);
        assert!(cache.get(&keys[0]).is_none());
        assert_eq!(cache.get(&keys[2]).as_deref(), Some("2"));
    }

    #[test]
    fn test_invalidate_handle() {
        let cache = RenderCache::new(10);
        let a = instance();
        let b = instance();
        let key_a = RenderKey::for_instance(RenderCachePolicy::Snapshot, &a, None).unwrap();
        let key_b = RenderKey::for_instance(RenderCachePolicy::Snapshot, &b, None).unwrap();
        cache.insert(key_a.clone(), "a".into());
        cache.insert(key_b.clone(), "b".into());

        cache.invalidate(a.handle());

        assert!(cache.get(&key_a).is_none());
        assert!(cache.get(&key_b).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
