//! Process-wide lookup of named caches.
//!
//! `#[timed_lru_cache]` registers each generated cache under its function name
//! (or the `name` attribute), so a cache hidden inside a function can still be
//! inspected and cleared from elsewhere.
//!
//! ```
//! use framecache_core::registry::CacheRegistry;
//! use framecache_core::{TimedCacheConfig, TimedLruCache};
//!
//! let cache: TimedLruCache<u32> = TimedLruCache::new(TimedCacheConfig::new());
//! CacheRegistry::global().register("doc_registry_example", cache.clone());
//!
//! let info = CacheRegistry::global().info("doc_registry_example").unwrap();
//! assert_eq!(info.currsize, 0);
//! assert!(CacheRegistry::global().clear("doc_registry_example"));
//! assert!(!CacheRegistry::global().clear("no_such_cache"));
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::timed_cache::{CacheInfo, TimedLruCache};

/// Operations the registry can run on a cache without knowing its value type.
pub trait ManagedCache: Send + Sync {
    fn clear(&self);
    fn info(&self) -> CacheInfo;
}

impl<R> ManagedCache for TimedLruCache<R>
where
    R: Clone + Send + 'static,
{
    fn clear(&self) {
        self.cache_clear();
    }

    fn info(&self) -> CacheInfo {
        self.cache_info()
    }
}

pub struct CacheRegistry {
    caches: RwLock<HashMap<String, Arc<dyn ManagedCache>>>,
}

impl CacheRegistry {
    fn new() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static CacheRegistry {
        static INSTANCE: OnceLock<CacheRegistry> = OnceLock::new();
        INSTANCE.get_or_init(CacheRegistry::new)
    }

    /// Registers `cache` under `name`, replacing any cache already there.
    pub fn register<M: ManagedCache + 'static>(&self, name: &str, cache: M) {
        let previous = self.caches.write().insert(name.to_string(), Arc::new(cache));
        if previous.is_some() {
            warn!(cache = name, "replaced a registered cache with the same name");
        } else {
            debug!(cache = name, "registered cache");
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    /// Clears the named cache. Returns `false` if no cache has that name.
    pub fn clear(&self, name: &str) -> bool {
        // Clone the handle so the cache lock is never taken under the registry lock.
        let cache = self.caches.read().get(name).cloned();
        match cache {
            Some(cache) => {
                cache.clear();
                true
            }
            None => false,
        }
    }

    /// Clears every registered cache and returns how many there were.
    pub fn clear_all(&self) -> usize {
        let caches: Vec<_> = self.caches.read().values().cloned().collect();
        for cache in &caches {
            cache.clear();
        }
        caches.len()
    }

    pub fn info(&self, name: &str) -> Option<CacheInfo> {
        let cache = self.caches.read().get(name).cloned();
        cache.map(|cache| cache.info())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }
}
