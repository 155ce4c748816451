// ==============================================
// EVICTION-ENGINE INVARIANT TESTS (integration)
// ==============================================
//
// Tests that pin down the engine-level behavior of the strategy chain:
// which entry loses under a given chain, how pre-filters claim the pool,
// and how the trigger threshold bounds occupancy. These span the store,
// entry and strategy modules and belong here rather than in any single
// source file.

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::thread::sleep;
use std::time::Duration;

use stashkit::prelude::*;

// ==============================================
// Age ordering
// ==============================================

#[test]
fn age_strategy_removes_the_oldest_entry() {
    let cache: CacheStore<String> = CacheBuilder::new(3).strategy(AgeStrategy).build();

    // Insertion order fixes relative ages: age-20s, age-10s, age-5s.
    for key in ["age-20s", "age-10s", "age-5s"] {
        cache.add(key, key.to_string(), EntryOptions::new()).unwrap();
        sleep(Duration::from_millis(25));
    }

    // Fourth insert forces exactly one eviction: the oldest goes.
    cache.add("new", "new".to_string(), EntryOptions::new()).unwrap();

    assert_eq!(cache.len(), 3);
    assert!(!cache.contains_key("age-20s"));
    assert!(cache.contains_key("age-10s"));
    assert!(cache.contains_key("age-5s"));
    assert!(cache.contains_key("new"));
}

// ==============================================
// Tidy priority
// ==============================================

#[derive(Default)]
struct Session {
    closed: AtomicUsize,
}

impl Dispose for Session {
    fn dispose(&self) {
        self.closed.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[test]
fn tidy_reclaims_dead_entries_before_any_usable_one() {
    let cache: CacheStore<AutoDisposer<Session>> = CacheBuilder::new(3)
        .strategy(TidyStrategy)
        .strategy(AgeStrategy)
        .build();

    for key in ["oldest", "middle", "newest"] {
        cache
            .add(key, AutoDisposer::new(Session::default()), EntryOptions::new())
            .unwrap();
        sleep(Duration::from_millis(25));
    }

    // Kill the middle entry. Age alone would pick "oldest"; the pre-filter
    // must pick the dead one instead.
    let entry = cache.get("middle").unwrap().expect("present");
    entry.item().retire();

    cache
        .add("new", AutoDisposer::new(Session::default()), EntryOptions::new())
        .unwrap();

    assert!(!cache.contains_key("middle"));
    assert!(cache.contains_key("oldest"));
    assert!(cache.contains_key("newest"));
    assert!(cache.contains_key("new"));
}

// ==============================================
// Custom strategies in the chain
// ==============================================

/// Keeps entries whose key starts with `pin:` in the cache as long as
/// anything unpinned remains.
struct PinAware;

impl EvictionStrategy<String> for PinAware {
    fn name(&self) -> &'static str {
        "pin-aware"
    }

    fn compare(&self, x: &CacheEntry<String>, y: &CacheEntry<String>) -> Ordering {
        let x_pinned = x.key().starts_with("pin:");
        let y_pinned = y.key().starts_with("pin:");
        match (x_pinned, y_pinned) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => Ordering::Equal,
        }
    }
}

#[test]
fn custom_strategy_chains_with_builtins() {
    let cache: CacheStore<String> = CacheBuilder::new(3)
        .strategy(PinAware)
        .strategy(AgeStrategy)
        .build();

    cache.add("pin:a", "a".to_string(), EntryOptions::new()).unwrap();
    sleep(Duration::from_millis(25));
    cache.add("plain-1", "b".to_string(), EntryOptions::new()).unwrap();
    sleep(Duration::from_millis(25));
    cache.add("plain-2", "c".to_string(), EntryOptions::new()).unwrap();

    // pin:a is the oldest, but PinAware outranks Age in the chain, so the
    // oldest *unpinned* entry loses.
    cache.add("plain-3", "d".to_string(), EntryOptions::new()).unwrap();

    assert!(cache.contains_key("pin:a"));
    assert!(!cache.contains_key("plain-1"));
}

// ==============================================
// Trigger threshold
// ==============================================

#[test]
fn threshold_bounds_occupancy_below_capacity() {
    let cache: CacheStore<String> = CacheBuilder::new(10)
        .eviction_threshold(0.5)
        .build();

    for i in 0..8 {
        let key = format!("k{i}");
        cache.add(key.clone(), key, EntryOptions::new()).unwrap();
    }

    // Scans run whenever occupancy crosses capacity * threshold and evict
    // back down to it.
    assert_eq!(cache.len(), 5);
}

#[test]
fn under_threshold_nothing_is_evicted() {
    let cache: CacheStore<String> = CacheBuilder::new(10).build();
    for i in 0..10 {
        let key = format!("k{i}");
        cache.add(key.clone(), key, EntryOptions::new()).unwrap();
    }
    assert_eq!(cache.len(), 10);
}

// ==============================================
// Size pressure with mixed strategies
// ==============================================

#[test]
fn size_pressure_uses_chain_order() {
    // Age primary, Larger tie-break: equal-age pairs shed the bigger one.
    let cache: CacheStore<String> = CacheBuilder::new(100)
        .max_total_size(100)
        .strategy(LargerStrategy)
        .strategy(AgeStrategy)
        .build();

    cache
        .add("huge", "h".to_string(), EntryOptions::new().with_size(70))
        .unwrap();
    cache
        .add("small-1", "s".to_string(), EntryOptions::new().with_size(20))
        .unwrap();
    cache
        .add("small-2", "s".to_string(), EntryOptions::new().with_size(20))
        .unwrap();

    // 110 > 100: Larger picks "huge" regardless of its age rank.
    assert!(!cache.contains_key("huge"));
    assert_eq!(cache.total_size(), 40);
}

// ==============================================
// Enumeration consistency after evictions
// ==============================================

#[test]
fn enumeration_stays_consistent_with_count() {
    let cache: CacheStore<String> = CacheBuilder::new(4).build();
    for i in 0..20 {
        let key = format!("k{i}");
        cache.add(key.clone(), key, EntryOptions::new()).unwrap();
    }

    let keys = cache.keys();
    assert_eq!(keys.len(), cache.len());
    for key in keys {
        assert!(
            cache.get(&key).unwrap().is_some(),
            "enumerated key {key} must be retrievable"
        );
    }
}

// ==============================================
// Evicted disposer-hosted items drain, not die
// ==============================================

#[test]
fn eviction_requests_disposal_instead_of_disposing() {
    let cache: CacheStore<AutoDisposer<Session>> = CacheBuilder::new(2).build();

    cache
        .add("a", AutoDisposer::new(Session::default()), EntryOptions::new())
        .unwrap();
    let guard = get_guarded(&cache, "a").unwrap().expect("guard");
    let disposer = Arc::clone(guard.disposer());

    // Force "a" out of the cache.
    cache
        .add("b", AutoDisposer::new(Session::default()), EntryOptions::new())
        .unwrap();
    cache
        .add("c", AutoDisposer::new(Session::default()), EntryOptions::new())
        .unwrap();
    assert!(!cache.contains_key("a"));

    // The guard is still out: disposal was requested, not performed.
    assert!(disposer.is_draining());
    assert_eq!(guard.closed.load(AtomicOrdering::SeqCst), 0);

    drop(guard);
    assert!(disposer.is_disposed());
}
