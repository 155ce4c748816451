//! Per-key entry metadata and entry options.
//!
//! ## Key Components
//!
//! - [`CacheEntry`]: the record binding a key to an item plus the metadata
//!   the eviction engine ranks on (age, idle time, size, insertion order).
//! - [`EntryOptions`]: per-entry expiration, declared size, and the per-entry
//!   override of the store's item-size limit.
//!
//! Entries are created and retired only by
//! [`CacheStore`](crate::store::CacheStore); callers see them as
//! `Arc<CacheEntry<V>>` snapshots. Access-time bookkeeping uses atomics so a
//! shared entry can be touched without any lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::traits::CacheItem;

/// Per-entry options: expiration, declared size, and limit overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Expire this long after creation, regardless of access.
    pub absolute_ttl: Option<Duration>,
    /// Expire this long after the last access.
    pub sliding_ttl: Option<Duration>,
    /// Declared size in cache units; falls back to
    /// [`CacheItem::size_units`] when absent.
    pub size: Option<i64>,
    /// Per-entry override of the store's `max_item_size`.
    pub max_item_size: Option<i64>,
}

impl EntryOptions {
    /// Options with no expiration, no declared size, no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an absolute expiration measured from creation.
    pub fn with_absolute_ttl(mut self, ttl: Duration) -> Self {
        self.absolute_ttl = Some(ttl);
        self
    }

    /// Set a sliding expiration measured from the last access.
    pub fn with_sliding_ttl(mut self, ttl: Duration) -> Self {
        self.sliding_ttl = Some(ttl);
        self
    }

    /// Declare the entry's size in cache units.
    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    /// Override the store's per-item size limit for this entry.
    pub fn with_max_item_size(mut self, max: i64) -> Self {
        self.max_item_size = Some(max);
        self
    }
}

/// A cache's internal record binding a key to an item plus metadata.
///
/// Owned by the store; shared out as `Arc<CacheEntry<V>>`. The store marks
/// an entry retired when it leaves the map, which permanently flips
/// [`can_use`](CacheEntry::can_use) to `false` for anyone still holding the
/// `Arc`.
pub struct CacheEntry<V> {
    key: String,
    item: Arc<V>,
    options: EntryOptions,
    size_units: i64,
    seq: u64,
    created: Instant,
    /// Millis since `created`; relaxed, approximate by design.
    last_accessed: AtomicU64,
    retired: AtomicBool,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(
        key: String,
        item: Arc<V>,
        options: EntryOptions,
        size_units: i64,
        seq: u64,
    ) -> Self {
        Self::new_at(key, item, options, size_units, seq, Instant::now())
    }

    /// Construct with an explicit creation instant. Internal; lets tests
    /// build entries with controlled ages.
    pub(crate) fn new_at(
        key: String,
        item: Arc<V>,
        options: EntryOptions,
        size_units: i64,
        seq: u64,
        created: Instant,
    ) -> Self {
        Self {
            key,
            item,
            options,
            size_units,
            seq,
            created,
            last_accessed: AtomicU64::new(0),
            retired: AtomicBool::new(false),
        }
    }

    /// The key this entry is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored item.
    pub fn item(&self) -> &Arc<V> {
        &self.item
    }

    /// Options the entry was inserted with.
    pub fn options(&self) -> &EntryOptions {
        &self.options
    }

    /// Size charged against the store's total, in cache units.
    pub fn size_units(&self) -> i64 {
        self.size_units
    }

    /// Insertion sequence number; the eviction engine's final tie-break.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Creation instant.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Instant of the last access (creation counts as an access).
    pub fn last_accessed(&self) -> Instant {
        self.created + Duration::from_millis(self.last_accessed.load(Ordering::Relaxed))
    }

    /// Time since creation.
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// Time since the last access.
    pub fn idle(&self) -> Duration {
        self.last_accessed().elapsed()
    }

    /// Refresh the last-access time.
    pub(crate) fn touch(&self) {
        let millis = self.created.elapsed().as_millis() as u64;
        self.last_accessed.store(millis, Ordering::Relaxed);
    }

    /// Mark the entry as removed from its store. One-way.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Whether the store has removed this entry.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Whether the entry's absolute or sliding expiration has elapsed.
    pub fn is_expired(&self) -> bool {
        if let Some(ttl) = self.options.absolute_ttl {
            if self.age() > ttl {
                return true;
            }
        }
        if let Some(ttl) = self.options.sliding_ttl {
            if self.idle() > ttl {
                return true;
            }
        }
        false
    }
}

impl<V: CacheItem> CacheEntry<V> {
    /// Whether the entry may be handed out: not retired, not expired, and
    /// the item itself still usable.
    pub fn can_use(&self) -> bool {
        !self.is_retired() && !self.is_expired() && self.item.can_use()
    }
}

impl<V> fmt::Debug for CacheEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("size_units", &self.size_units)
            .field("seq", &self.seq)
            .field("age", &self.age())
            .field("retired", &self.is_retired())
            .finish()
    }
}
