//! Idle-time strategy: longest-untouched entries evicted first.

use std::cmp::Ordering;

use crate::entry::CacheEntry;
use crate::strategy::EvictionStrategy;
use crate::traits::CacheItem;

/// Ranks by last-access time: the entry untouched longest is evicted first.
///
/// Like [`AgeStrategy`](crate::strategy::AgeStrategy), comparison uses the
/// raw last-access instants so the ordering stays total while sorting.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleStrategy;

impl<V: CacheItem> EvictionStrategy<V> for IdleStrategy {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn compare(&self, x: &CacheEntry<V>, y: &CacheEntry<V>) -> Ordering {
        // Earlier last access = longer idle = lower priority.
        x.last_accessed().cmp(&y.last_accessed())
    }
}
