//! Tidy strategy: reclaim unusable entries before ranking live ones.

use std::sync::Arc;

use crate::entry::CacheEntry;
use crate::strategy::EvictionStrategy;
use crate::traits::CacheItem;

/// Pre-filters the pool down to entries whose [`can_use`] is `false`:
/// retired, expired, or vetoed by the item itself. The comparison is a
/// no-op; when this strategy claims the pool, every member is already dead
/// and order does not matter beyond the chain's deterministic tie-break.
///
/// [`can_use`]: CacheEntry::can_use
#[derive(Debug, Clone, Copy, Default)]
pub struct TidyStrategy;

impl<V: CacheItem> EvictionStrategy<V> for TidyStrategy {
    fn name(&self) -> &'static str {
        "tidy"
    }

    fn pre_filter(&self, pool: &[Arc<CacheEntry<V>>]) -> Vec<Arc<CacheEntry<V>>> {
        pool.iter()
            .filter(|entry| !entry.can_use())
            .cloned()
            .collect()
    }
}
