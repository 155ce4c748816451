//! Convenience re-exports of the public surface.

pub use crate::disposer::{AutoDisposer, UsageGuard};
pub use crate::entry::{CacheEntry, EntryOptions};
pub use crate::error::{BoxError, CacheError, Result};
pub use crate::guarded::{
    get_guarded, get_guarded_async, get_or_create_guarded, get_or_create_guarded_async,
};
pub use crate::registry::CacheRegistry;
pub use crate::store::{CacheBuilder, CacheConfig, CacheStore};
pub use crate::strategy::{
    AgeStrategy, EvictionStrategy, IdleStrategy, LargerStrategy, SmallerStrategy, TidyStrategy,
};
pub use crate::traits::{CacheItem, Dispose};
