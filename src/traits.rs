//! Item contracts consumed by the cache.
//!
//! Stores stay generic over what they hold; these traits are the entire
//! surface an item has to offer. [`CacheItem`] defaults every method so a
//! plain value type opts in with an empty `impl`, while richer items
//! (disposable resources, self-describing records, [`AutoDisposer`]-hosted
//! objects) override only what they need.
//!
//! ## Trait Summary
//!
//! | Trait       | Purpose                                             |
//! |-------------|-----------------------------------------------------|
//! | `Dispose`   | Single disposal entry point, called exactly once    |
//! | `CacheItem` | Usability, size, disposal request, self-description |
//!
//! [`AutoDisposer`]: crate::disposer::AutoDisposer

use crate::entry::EntryOptions;

/// Disposal contract an item may opt into.
///
/// The cache (or an [`AutoDisposer`](crate::disposer::AutoDisposer)) calls
/// [`dispose`](Dispose::dispose) exactly once per item lifetime. The receiver
/// is `&self`: a shared resource releasing itself (closing a socket,
/// flushing a handle) manages its own interior mutability, the same way an
/// `Arc`-shared connection would. Dropping the value afterwards is the
/// owner's business and must remain safe.
pub trait Dispose {
    /// Release the resource held by this item.
    fn dispose(&self);
}

/// What a cache store needs from a stored item.
///
/// Every method has a default, so the minimal impl is empty:
///
/// ```
/// use stashkit::traits::CacheItem;
///
/// struct Page(Vec<u8>);
///
/// impl CacheItem for Page {
///     fn size_units(&self) -> i64 {
///         self.0.len() as i64
///     }
/// }
/// ```
pub trait CacheItem: Send + Sync + 'static {
    /// Whether the item may still be handed out to callers.
    ///
    /// A `false` here makes the owning entry unusable, which is what the
    /// `Tidy` strategy reclaims first under pressure.
    fn can_use(&self) -> bool {
        true
    }

    /// Called once when the cache drops its reference to the item.
    ///
    /// Plain disposables release here directly; an
    /// [`AutoDisposer`](crate::disposer::AutoDisposer) only flags intent and
    /// defers the real release to its last outstanding guard.
    fn request_dispose(&self) {}

    /// Declared size in cache units, used when the entry options do not
    /// override it.
    fn size_units(&self) -> i64 {
        1
    }

    /// Self-describing items may supply their own cache key, letting
    /// [`CacheStore::add_item`](crate::store::CacheStore::add_item) be called
    /// with just the item.
    fn cache_key(&self) -> Option<String> {
        None
    }

    /// Default entry options for self-describing items.
    fn default_options(&self) -> Option<EntryOptions> {
        None
    }
}

impl CacheItem for String {
    fn size_units(&self) -> i64 {
        self.len() as i64
    }
}

impl CacheItem for Vec<u8> {
    fn size_units(&self) -> i64 {
        self.len() as i64
    }
}
