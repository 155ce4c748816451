//! Size strategies: evict by declared entry size.
//!
//! [`LargerStrategy`] frees the most units per eviction; [`SmallerStrategy`]
//! preserves expensive-to-rebuild large items by shedding cheap small ones.

use std::cmp::Ordering;

use crate::entry::CacheEntry;
use crate::strategy::EvictionStrategy;
use crate::traits::CacheItem;

/// Biggest entries evicted first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargerStrategy;

impl<V: CacheItem> EvictionStrategy<V> for LargerStrategy {
    fn name(&self) -> &'static str {
        "larger"
    }

    fn compare(&self, x: &CacheEntry<V>, y: &CacheEntry<V>) -> Ordering {
        // Inverted: bigger = lower priority.
        y.size_units().cmp(&x.size_units())
    }
}

/// Smallest entries evicted first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallerStrategy;

impl<V: CacheItem> EvictionStrategy<V> for SmallerStrategy {
    fn name(&self) -> &'static str {
        "smaller"
    }

    fn compare(&self, x: &CacheEntry<V>, y: &CacheEntry<V>) -> Ordering {
        // Natural: smaller = lower priority.
        x.size_units().cmp(&y.size_units())
    }
}
