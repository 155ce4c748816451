//! Keyed cache store with capacity/size accounting and the eviction engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        CacheStore<V: CacheItem>                      │
//! │                                                                      │
//! │   config: CacheConfig          strategies: [Box<dyn Strategy>]       │
//! │   closed: AtomicBool                                                 │
//! │                                                                      │
//! │   state: tokio::sync::Mutex ─────────────────────────────┐           │
//! │   │                                                      │           │
//! │   │   map: FxHashMap<String, Arc<CacheEntry<V>>>         │           │
//! │   │   total_size: i64        next_seq: u64               │           │
//! │   └──────────────────────────────────────────────────────┘           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One coarse mutex guards the key map and all capacity/size bookkeeping;
//! insertion, lookup-with-creation, removal and the whole eviction
//! scan-and-remove sequence run under it, which is what makes
//! "check threshold → select victims → remove" atomic and bounds every
//! factory to at most one invocation per missing-key race.
//!
//! Every operation comes in a blocking and an async variant with identical
//! observable semantics. The blocking variants use
//! [`Mutex::blocking_lock`](tokio::sync::Mutex::blocking_lock) and must not
//! be called from async context; the async variants suspend only while
//! waiting for the mutex, and dropping one mid-wait aborts the operation
//! without mutating shared state.
//!
//! ## Core Operations
//!
//! | Operation            | Description                                    |
//! |----------------------|------------------------------------------------|
//! | `add` / `add_opts`   | Insert; size-checked, may trigger eviction     |
//! | `add_item`           | Insert a self-describing item                  |
//! | `get`                | Fetch + touch; expired entries become misses   |
//! | `get_required`       | Fetch that fails with `NotFound` when absent   |
//! | `get_or_create`      | Fetch or run the factory at most once          |
//! | `try_remove`         | Remove by key, requesting disposal             |
//! | `remove_entry`       | Remove by entry identity                       |
//! | `clear` / `close`    | Drop everything; `close` is one-way            |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::entry::{CacheEntry, EntryOptions};
use crate::error::{BoxError, CacheError, Result};
use crate::strategy::{compare_chain, EvictionStrategy};
use crate::traits::CacheItem;

mod builder;

pub use builder::{CacheBuilder, CacheConfig};

struct StoreState<V: CacheItem> {
    map: FxHashMap<String, Arc<CacheEntry<V>>>,
    total_size: i64,
    next_seq: u64,
}

/// A factory failing with a [`CacheError`] (typically
/// [`CacheError::Cancelled`]) propagates it as-is; anything else is wrapped.
fn factory_error(err: BoxError) -> CacheError {
    match err.downcast::<CacheError>() {
        Ok(err) => *err,
        Err(err) => CacheError::Factory(err),
    }
}

/// The keyed map, capacity/size accounting, and the eviction engine.
///
/// Construct via [`CacheBuilder`]. Thread-safe; share as `Arc<CacheStore<V>>`.
pub struct CacheStore<V: CacheItem> {
    state: Mutex<StoreState<V>>,
    config: CacheConfig,
    strategies: Vec<Box<dyn EvictionStrategy<V>>>,
    closed: AtomicBool,
}

impl<V: CacheItem> CacheStore<V> {
    pub(crate) fn with_parts(
        config: CacheConfig,
        strategies: Vec<Box<dyn EvictionStrategy<V>>>,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState {
                map: FxHashMap::default(),
                total_size: 0,
                next_seq: 0,
            }),
            config,
            strategies,
            closed: AtomicBool::new(false),
        }
    }

    /// The configuration the store was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Maximum entry count.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(CacheError::AlreadyDisposed)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------
    // Add
    // -----------------------------------------------------------------

    /// Insert `item` under `key`, replacing and disposing any existing
    /// entry. Equivalent to `add_opts(key, item, options, true, true)`.
    pub fn add(
        &self,
        key: impl Into<String>,
        item: V,
        options: EntryOptions,
    ) -> Result<Arc<CacheEntry<V>>> {
        self.add_opts(key, item, options, true, true)
    }

    /// Async variant of [`add`](Self::add).
    pub async fn add_async(
        &self,
        key: impl Into<String>,
        item: V,
        options: EntryOptions,
    ) -> Result<Arc<CacheEntry<V>>> {
        self.add_opts_async(key, item, options, true, true).await
    }

    /// Insert with full control over replacement semantics.
    ///
    /// With `remove_existing = false` an existing entry is returned
    /// unchanged; the first successful insert wins a race, and later callers
    /// observe the winner's entry. In that case `dispose_unused` decides
    /// whether the caller's never-stored `item` has its disposal requested,
    /// so a constructed-but-unused resource does not leak.
    ///
    /// Fails with [`CacheError::ResourceExceeded`], without touching the
    /// map, when the declared size exceeds the effective per-item limit.
    pub fn add_opts(
        &self,
        key: impl Into<String>,
        item: V,
        options: EntryOptions,
        remove_existing: bool,
        dispose_unused: bool,
    ) -> Result<Arc<CacheEntry<V>>> {
        let mut state = self.state.blocking_lock();
        self.add_locked(
            &mut state,
            key.into(),
            item,
            options,
            remove_existing,
            dispose_unused,
        )
    }

    /// Async variant of [`add_opts`](Self::add_opts).
    pub async fn add_opts_async(
        &self,
        key: impl Into<String>,
        item: V,
        options: EntryOptions,
        remove_existing: bool,
        dispose_unused: bool,
    ) -> Result<Arc<CacheEntry<V>>> {
        let mut state = self.state.lock().await;
        self.add_locked(
            &mut state,
            key.into(),
            item,
            options,
            remove_existing,
            dispose_unused,
        )
    }

    /// Insert a self-describing item: the key comes from
    /// [`CacheItem::cache_key`], the options from
    /// [`CacheItem::default_options`].
    pub fn add_item(&self, item: V) -> Result<Arc<CacheEntry<V>>> {
        let key = item
            .cache_key()
            .ok_or(CacheError::InvalidState("item does not supply a cache key"))?;
        let options = item.default_options().unwrap_or_default();
        self.add(key, item, options)
    }

    /// Async variant of [`add_item`](Self::add_item).
    pub async fn add_item_async(&self, item: V) -> Result<Arc<CacheEntry<V>>> {
        let key = item
            .cache_key()
            .ok_or(CacheError::InvalidState("item does not supply a cache key"))?;
        let options = item.default_options().unwrap_or_default();
        self.add_async(key, item, options).await
    }

    fn add_locked(
        &self,
        state: &mut StoreState<V>,
        key: String,
        item: V,
        options: EntryOptions,
        remove_existing: bool,
        dispose_unused: bool,
    ) -> Result<Arc<CacheEntry<V>>> {
        self.ensure_open()?;

        let size = options.size.unwrap_or_else(|| item.size_units());
        if size < 0 {
            return Err(CacheError::InvalidState("entry size must be non-negative"));
        }
        let max = self
            .config
            .max_item_size
            .min(options.max_item_size.unwrap_or(i64::MAX));
        if size > max {
            return Err(CacheError::ResourceExceeded { size, max });
        }

        if !remove_existing {
            if let Some(existing) = state.map.get(&key) {
                let existing = Arc::clone(existing);
                if dispose_unused {
                    item.request_dispose();
                }
                return Ok(existing);
            }
        } else if let Some(old) = state.map.remove(&key) {
            self.detach(state, &old, true);
        }

        let entry = Arc::new(CacheEntry::new(
            key.clone(),
            Arc::new(item),
            options,
            size,
            state.next_seq,
        ));
        state.next_seq += 1;
        state.total_size += size;
        state.map.insert(key, Arc::clone(&entry));
        trace!(key = entry.key(), size, "entry added");

        self.evict_if_needed(state);
        Ok(entry)
    }

    // -----------------------------------------------------------------
    // Get
    // -----------------------------------------------------------------

    /// Fetch the entry for `key`, refreshing its last-access time.
    ///
    /// An expired entry is removed (disposal requested) and reported as
    /// absent, so a follow-up [`get_or_create`](Self::get_or_create) can
    /// rebuild it.
    pub fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry<V>>>> {
        let mut state = self.state.blocking_lock();
        self.ensure_open()?;
        Ok(self.get_locked(&mut state, key))
    }

    /// Async variant of [`get`](Self::get).
    pub async fn get_async(&self, key: &str) -> Result<Option<Arc<CacheEntry<V>>>> {
        let mut state = self.state.lock().await;
        self.ensure_open()?;
        Ok(self.get_locked(&mut state, key))
    }

    /// Fetch the entry for `key`, failing with [`CacheError::NotFound`]
    /// when it is absent or expired.
    pub fn get_required(&self, key: &str) -> Result<Arc<CacheEntry<V>>> {
        self.get(key)?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    /// Async variant of [`get_required`](Self::get_required).
    pub async fn get_required_async(&self, key: &str) -> Result<Arc<CacheEntry<V>>> {
        self.get_async(key)
            .await?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    /// Fetch the entry for `key`, or run `factory` and insert its result.
    ///
    /// The factory runs under the store lock, so it is invoked at most once
    /// per missing-key race; losers observe the winner's entry. A factory
    /// error fails the call and inserts nothing: a factory that fails with a
    /// [`CacheError`] (such as [`CacheError::Cancelled`]) has that error
    /// propagated unchanged, any other error is wrapped in
    /// [`CacheError::Factory`].
    pub fn get_or_create<F>(
        &self,
        key: &str,
        options: EntryOptions,
        factory: F,
    ) -> Result<Arc<CacheEntry<V>>>
    where
        F: FnOnce(&str) -> std::result::Result<V, BoxError>,
    {
        let mut state = self.state.blocking_lock();
        self.ensure_open()?;
        if let Some(entry) = self.get_locked(&mut state, key) {
            return Ok(entry);
        }
        let item = factory(key).map_err(factory_error)?;
        self.add_locked(&mut state, key.to_string(), item, options, true, true)
    }

    /// Async variant of [`get_or_create`](Self::get_or_create); the factory
    /// future is awaited while the store lock is held, preserving the
    /// at-most-one-creation guarantee.
    pub async fn get_or_create_async<F, Fut>(
        &self,
        key: &str,
        options: EntryOptions,
        factory: F,
    ) -> Result<Arc<CacheEntry<V>>>
    where
        F: FnOnce(&str) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<V, BoxError>>,
    {
        let mut state = self.state.lock().await;
        self.ensure_open()?;
        if let Some(entry) = self.get_locked(&mut state, key) {
            return Ok(entry);
        }
        let item = factory(key).await.map_err(factory_error)?;
        self.add_locked(&mut state, key.to_string(), item, options, true, true)
    }

    fn get_locked(&self, state: &mut StoreState<V>, key: &str) -> Option<Arc<CacheEntry<V>>> {
        match state.map.get(key) {
            Some(entry) if !entry.is_expired() => {
                entry.touch();
                return Some(Arc::clone(entry));
            },
            Some(_) => {},
            None => return None,
        }
        // Expired: drop it and report a miss.
        if let Some(old) = state.map.remove(key) {
            trace!(key, "expired entry removed on access");
            self.detach(state, &old, true);
        }
        None
    }

    // -----------------------------------------------------------------
    // Remove / clear / close
    // -----------------------------------------------------------------

    /// Remove the mapping for `key`, requesting disposal of the item.
    /// Returns the (now retired) entry if one existed.
    pub fn try_remove(&self, key: &str) -> Result<Option<Arc<CacheEntry<V>>>> {
        let mut state = self.state.blocking_lock();
        self.ensure_open()?;
        Ok(self.remove_locked(&mut state, key))
    }

    /// Async variant of [`try_remove`](Self::try_remove).
    pub async fn try_remove_async(&self, key: &str) -> Result<Option<Arc<CacheEntry<V>>>> {
        let mut state = self.state.lock().await;
        self.ensure_open()?;
        Ok(self.remove_locked(&mut state, key))
    }

    /// Remove `entry` only if it is still the entry mapped for its key
    /// (identity match, not key match). Returns whether it was removed.
    pub fn remove_entry(&self, entry: &Arc<CacheEntry<V>>) -> Result<bool> {
        let mut state = self.state.blocking_lock();
        self.ensure_open()?;
        Ok(self.remove_entry_locked(&mut state, entry))
    }

    /// Async variant of [`remove_entry`](Self::remove_entry).
    pub async fn remove_entry_async(&self, entry: &Arc<CacheEntry<V>>) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.ensure_open()?;
        Ok(self.remove_entry_locked(&mut state, entry))
    }

    /// Remove all entries, optionally requesting disposal of every item.
    pub fn clear(&self, dispose_items: bool) -> Result<()> {
        let mut state = self.state.blocking_lock();
        self.ensure_open()?;
        self.clear_locked(&mut state, dispose_items);
        Ok(())
    }

    /// Async variant of [`clear`](Self::clear).
    pub async fn clear_async(&self, dispose_items: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_open()?;
        self.clear_locked(&mut state, dispose_items);
        Ok(())
    }

    /// Tear the store down. One-way and idempotent; every subsequent
    /// operation fails with [`CacheError::AlreadyDisposed`].
    pub fn close(&self, dispose_items: bool) {
        let mut state = self.state.blocking_lock();
        self.close_locked(&mut state, dispose_items);
    }

    /// Async variant of [`close`](Self::close).
    pub async fn close_async(&self, dispose_items: bool) {
        let mut state = self.state.lock().await;
        self.close_locked(&mut state, dispose_items);
    }

    fn remove_locked(&self, state: &mut StoreState<V>, key: &str) -> Option<Arc<CacheEntry<V>>> {
        let entry = state.map.remove(key)?;
        self.detach(state, &entry, true);
        trace!(key, "entry removed");
        Some(entry)
    }

    fn remove_entry_locked(&self, state: &mut StoreState<V>, entry: &Arc<CacheEntry<V>>) -> bool {
        let matches = state
            .map
            .get(entry.key())
            .is_some_and(|current| Arc::ptr_eq(current, entry));
        if matches {
            state.map.remove(entry.key());
            self.detach(state, entry, true);
            trace!(key = entry.key(), "entry removed by identity");
        }
        matches
    }

    fn clear_locked(&self, state: &mut StoreState<V>, dispose_items: bool) {
        debug!(len = state.map.len(), dispose_items, "cache cleared");
        for (_, entry) in state.map.drain() {
            entry.retire();
            if dispose_items {
                entry.item().request_dispose();
            }
        }
        state.total_size = 0;
    }

    fn close_locked(&self, state: &mut StoreState<V>, dispose_items: bool) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(len = state.map.len(), "cache closed");
        self.clear_locked(state, dispose_items);
    }

    /// Detach an entry that has already left the map: undo its size charge,
    /// retire it, and optionally request disposal of its item.
    fn detach(&self, state: &mut StoreState<V>, entry: &Arc<CacheEntry<V>>, dispose: bool) {
        state.total_size -= entry.size_units();
        entry.retire();
        if dispose {
            entry.item().request_dispose();
        }
    }

    // -----------------------------------------------------------------
    // Eviction engine
    // -----------------------------------------------------------------

    /// Entry-count and total-size levels that both trigger a scan and serve
    /// as its target: eviction runs until usage falls back under them.
    fn trigger_levels(&self) -> (usize, i64) {
        let threshold = self.config.eviction_threshold;
        let count_trigger = ((self.config.capacity as f64 * threshold) as usize).max(1);
        let size_trigger = (self.config.max_total_size as f64 * threshold) as i64;
        (count_trigger, size_trigger)
    }

    fn over_trigger(&self, state: &StoreState<V>) -> bool {
        let (count_trigger, size_trigger) = self.trigger_levels();
        state.map.len() > count_trigger || state.total_size > size_trigger
    }

    fn evict_if_needed(&self, state: &mut StoreState<V>) {
        if !self.over_trigger(state) {
            return;
        }
        debug!(
            len = state.map.len(),
            total_size = state.total_size,
            "eviction scan"
        );

        let all: Vec<Arc<CacheEntry<V>>> = state.map.values().cloned().collect();

        // Pool selection: the first active strategy whose filter yields
        // entries claims the pool. Dead-entry reclamation beats ranking.
        let mut pool: Vec<Arc<CacheEntry<V>>> = Vec::new();
        for strategy in &self.strategies {
            if !strategy.is_condition_met() {
                continue;
            }
            let filtered = strategy.pre_filter(&all);
            if !filtered.is_empty() {
                trace!(
                    strategy = strategy.name(),
                    claimed = filtered.len(),
                    "pre-filter claimed eviction pool"
                );
                pool = filtered;
                break;
            }
        }
        if pool.is_empty() {
            pool = all;
        }

        pool.sort_by(|a, b| compare_chain(&self.strategies, a, b));

        let (count_trigger, size_trigger) = self.trigger_levels();
        for victim in pool {
            if state.map.len() <= count_trigger && state.total_size <= size_trigger {
                break;
            }
            let matches = state
                .map
                .get(victim.key())
                .is_some_and(|current| Arc::ptr_eq(current, &victim));
            if matches {
                state.map.remove(victim.key());
                self.detach(state, &victim, true);
                trace!(key = victim.key(), "entry evicted");
            }
        }
    }

    // -----------------------------------------------------------------
    // Dictionary surface
    // -----------------------------------------------------------------

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.state.blocking_lock().map.len()
    }

    /// Async variant of [`len`](Self::len).
    pub async fn len_async(&self) -> usize {
        self.state.lock().await.map.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of declared sizes across all entries.
    pub fn total_size(&self) -> i64 {
        self.state.blocking_lock().total_size
    }

    /// Async variant of [`total_size`](Self::total_size).
    pub async fn total_size_async(&self) -> i64 {
        self.state.lock().await.total_size
    }

    /// Whether `key` is currently mapped.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.blocking_lock().map.contains_key(key)
    }

    /// Async variant of [`contains_key`](Self::contains_key).
    pub async fn contains_key_async(&self, key: &str) -> bool {
        self.state.lock().await.map.contains_key(key)
    }

    /// Snapshot of all keys.
    pub fn keys(&self) -> Vec<String> {
        self.state.blocking_lock().map.keys().cloned().collect()
    }

    /// Async variant of [`keys`](Self::keys).
    pub async fn keys_async(&self) -> Vec<String> {
        self.state.lock().await.map.keys().cloned().collect()
    }

    /// Snapshot of all stored items.
    pub fn values(&self) -> Vec<Arc<V>> {
        self.state
            .blocking_lock()
            .map
            .values()
            .map(|entry| Arc::clone(entry.item()))
            .collect()
    }

    /// Async variant of [`values`](Self::values).
    pub async fn values_async(&self) -> Vec<Arc<V>> {
        self.state
            .lock()
            .await
            .map
            .values()
            .map(|entry| Arc::clone(entry.item()))
            .collect()
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<Arc<CacheEntry<V>>> {
        self.state.blocking_lock().map.values().cloned().collect()
    }

    /// Async variant of [`entries`](Self::entries).
    pub async fn entries_async(&self) -> Vec<Arc<CacheEntry<V>>> {
        self.state.lock().await.map.values().cloned().collect()
    }
}

impl<V: CacheItem> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
