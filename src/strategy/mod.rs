//! Pluggable eviction strategies and chain composition.
//!
//! A strategy contributes two things to an eviction scan:
//!
//! 1. a **pre-filter** that may claim the candidate pool outright (the first
//!    strategy in the chain whose filter yields entries wins the pool, and
//!    dead-entry reclamation beats ranking live entries), and
//! 2. a **comparator** used to rank the pool. The chain is the comparator:
//!    the first strategy is the primary key, later strategies break ties,
//!    and insertion order is the final deterministic tie-break.
//!
//! `Ordering::Less` from [`EvictionStrategy::compare`] means "evict `x`
//! first". The engine sorts ascending and evicts from the front.
//!
//! ## Built-in strategies
//!
//! | Strategy          | Pre-filter          | Comparison                  |
//! |-------------------|---------------------|-----------------------------|
//! | [`TidyStrategy`]  | unusable entries    | none (filter does the work) |
//! | [`AgeStrategy`]   | —                   | older evicted first         |
//! | [`IdleStrategy`]  | —                   | longest-untouched first     |
//! | [`LargerStrategy`]| —                   | biggest evicted first       |
//! | [`SmallerStrategy`]| —                  | smallest evicted first      |
//!
//! Custom strategies implement [`EvictionStrategy`] and are appended to the
//! chain via [`CacheBuilder::strategy`](crate::store::CacheBuilder::strategy).

use std::cmp::Ordering;
use std::sync::Arc;

use crate::entry::CacheEntry;
use crate::traits::CacheItem;

mod age;
mod idle;
mod size;
mod tidy;

pub use age::AgeStrategy;
pub use idle::IdleStrategy;
pub use size::{LargerStrategy, SmallerStrategy};
pub use tidy::TidyStrategy;

/// A pluggable policy deciding which entries to remove under pressure.
pub trait EvictionStrategy<V: CacheItem>: Send + Sync {
    /// Short name used in trace output.
    fn name(&self) -> &'static str;

    /// Whether this strategy currently applies. Strategies that return
    /// `false` are skipped for both filtering and comparison, which allows
    /// conditional chains.
    fn is_condition_met(&self) -> bool {
        true
    }

    /// Narrow the candidate pool. Returning a non-empty vector claims the
    /// pool for this scan; returning an empty one makes no claim.
    fn pre_filter(&self, pool: &[Arc<CacheEntry<V>>]) -> Vec<Arc<CacheEntry<V>>> {
        let _ = pool;
        Vec::new()
    }

    /// Rank two entries. `Less` means "evict `x` before `y`".
    fn compare(&self, x: &CacheEntry<V>, y: &CacheEntry<V>) -> Ordering {
        let _ = (x, y);
        Ordering::Equal
    }
}

/// Composite comparator over a strategy chain.
///
/// The first active strategy with a non-equal verdict wins; exhausted chains
/// fall back to insertion order (earlier inserts evicted first).
pub fn compare_chain<V: CacheItem>(
    strategies: &[Box<dyn EvictionStrategy<V>>],
    x: &CacheEntry<V>,
    y: &CacheEntry<V>,
) -> Ordering {
    for strategy in strategies {
        if !strategy.is_condition_met() {
            continue;
        }
        match strategy.compare(x, y) {
            Ordering::Equal => continue,
            verdict => return verdict,
        }
    }
    x.seq().cmp(&y.seq())
}
