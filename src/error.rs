//! Error types for the stashkit library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: the single error enum every fallible operation returns.
//! - [`Result`]: convenience alias used throughout the crate.
//! - [`BoxError`]: the error type entry factories are allowed to fail with.
//!   A factory failing with a boxed [`CacheError`] (typically
//!   [`CacheError::Cancelled`]) has it propagated as-is; any other error is
//!   wrapped into [`CacheError::Factory`].
//!
//! Every variant surfaces synchronously to the direct caller of the
//! operation that detected it. The one condition that is absorbed instead of
//! surfaced is the eviction-vs-acquire race inside the guarded-access
//! helpers (see [`crate::guarded`]), which retries rather than erroring.

use thiserror::Error;

/// Boxed error type accepted from entry factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for cache and disposer operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent on a path that requires it to exist.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Operation requested in a state that forbids it, e.g. acquiring a
    /// usage guard from a draining or disposed [`AutoDisposer`].
    ///
    /// [`AutoDisposer`]: crate::disposer::AutoDisposer
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Declared item size exceeds the effective per-item limit.
    #[error("item size {size} exceeds limit {max}")]
    ResourceExceeded { size: i64, max: i64 },

    /// Cooperative cancellation observed by a factory or caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation attempted on a cache that has been closed.
    #[error("cache already disposed")]
    AlreadyDisposed,

    /// Invalid configuration passed to the builder.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An entry factory failed; nothing was inserted.
    #[error("entry factory failed: {0}")]
    Factory(#[source] BoxError),
}

/// Convenience result alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
