//! Explicit registry of live cache stores.
//!
//! A registry is an object callers construct and pass through their own
//! context, deliberately not a process-wide singleton table. It holds
//! [`Weak`] references, so registration never extends a store's lifetime;
//! lookups upgrade on the fly and prune handles whose stores are gone.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::store::CacheStore;
use crate::traits::CacheItem;

/// Named handles to live [`CacheStore`] instances.
pub struct CacheRegistry<V: CacheItem> {
    stores: RwLock<FxHashMap<String, Weak<CacheStore<V>>>>,
}

impl<V: CacheItem> Default for CacheRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: CacheItem> CacheRegistry<V> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register `store` under `name`, replacing any previous registration.
    pub fn insert(&self, name: impl Into<String>, store: &Arc<CacheStore<V>>) {
        self.stores
            .write()
            .insert(name.into(), Arc::downgrade(store));
    }

    /// Look up a live store by name. A handle whose store has been dropped
    /// is pruned and reported absent.
    pub fn get(&self, name: &str) -> Option<Arc<CacheStore<V>>> {
        if let Some(store) = self.stores.read().get(name).and_then(Weak::upgrade) {
            return Some(store);
        }
        // Either unknown or dead; drop a dead handle if that is what we hit.
        let mut stores = self.stores.write();
        match stores.get(name).and_then(Weak::upgrade) {
            Some(store) => Some(store),
            None => {
                stores.remove(name);
                None
            },
        }
    }

    /// Remove a registration. Returns whether one existed.
    pub fn remove(&self, name: &str) -> bool {
        self.stores.write().remove(name).is_some()
    }

    /// Names of all live registrations, pruning dead ones.
    pub fn names(&self) -> Vec<String> {
        let mut stores = self.stores.write();
        stores.retain(|_, store| store.strong_count() > 0);
        stores.keys().cloned().collect()
    }
}

impl<V: CacheItem> std::fmt::Debug for CacheRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("registered", &self.stores.read().len())
            .finish()
    }
}
