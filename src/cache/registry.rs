//! Cache registry - Central management for all caches.

use std::any::{Any, TypeId};
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::{CacheConfig, TypedCache};

/// Named caches shared across repositories and the permission checker.
///
/// A cache is identified by its name and its key/value types, so asking for
/// the same name twice hands back the same underlying cache.
#[derive(Clone)]
pub struct CacheRegistry {
    caches: Arc<DashMap<(String, TypeId), Box<dyn Any + Send + Sync>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        info!("Cache registry initialized");
        Self {
            caches: Arc::new(DashMap::new()),
        }
    }

    /// Get an existing cache or create a new one if it doesn't exist.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let key = (name.to_string(), TypeId::of::<TypedCache<K, V>>());
        let entry = self.caches.entry(key).or_insert_with(|| {
            debug!("Creating cache: {}", name);
            Box::new(TypedCache::<K, V>::new(name, config))
        });

        match entry.downcast_ref::<TypedCache<K, V>>() {
            Some(cache) => cache.clone(),
            None => TypedCache::new(name, config),
        }
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("cache_count", &self.caches.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_shares_cache() {
        let registry = CacheRegistry::new();
        let a: TypedCache<i64, String> = registry.get_or_create("chats", CacheConfig::with_capacity(100));
        let b: TypedCache<i64, String> = registry.get_or_create("chats", CacheConfig::with_capacity(100));

        a.insert(1, "one".to_string());
        assert_eq!(b.get(&1).as_deref(), Some("one"));
    }

    #[test]
    fn test_types_keep_caches_apart() {
        let registry = CacheRegistry::new();
        let a: TypedCache<i64, String> = registry.get_or_create("chats", CacheConfig::with_capacity(100));
        let b: TypedCache<i64, bool> = registry.get_or_create("chats", CacheConfig::with_capacity(100));

        a.insert(1, "one".to_string());
        assert_eq!(b.get(&1), None);
    }
}
