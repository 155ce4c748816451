//! Age strategy: oldest entries evicted first.

use std::cmp::Ordering;

use crate::entry::CacheEntry;
use crate::strategy::EvictionStrategy;
use crate::traits::CacheItem;

/// Ranks by creation time: the older entry is evicted first.
///
/// Comparison uses the raw creation instants rather than computed ages, so
/// the ordering is total and stable for the duration of a sort even while
/// the clock advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgeStrategy;

impl<V: CacheItem> EvictionStrategy<V> for AgeStrategy {
    fn name(&self) -> &'static str {
        "age"
    }

    fn compare(&self, x: &CacheEntry<V>, y: &CacheEntry<V>) -> Ordering {
        // Earlier creation = larger age = lower priority.
        x.created().cmp(&y.created())
    }
}
