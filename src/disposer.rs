//! Reference-counted lifecycle guard for shared disposable objects.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                state: AtomicU64 (one word)                   │
//!   │                                                              │
//!   │    bits 62..64: tag          bits 0..62: use count           │
//!   │                                                              │
//!   │    Active(n) ──retire()──► Draining(n>0) ──last drop──┐      │
//!   │        │                                              ▼      │
//!   │        └──retire() with n == 0──────────────────► Disposed   │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is a CAS loop over the single state word, so there is no
//! window between "check the flag" and "update the counter": the one CAS
//! that lands in `Disposed` runs [`Dispose::dispose`], exactly once. The
//! disposer shares no lock with any cache, so releasing a guard can never
//! deadlock against a concurrent store operation.
//!
//! ## Key Components
//!
//! - [`AutoDisposer`]: hosts the object and the tagged state word.
//! - [`UsageGuard`]: scoped handle; `Deref`s to the object and releases its
//!   use on drop.
//!
//! A cache eviction only calls [`AutoDisposer::retire`], never a direct
//! dispose: "removed from the cache index" and "resource actually released"
//! are decoupled on purpose.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CacheError, Result};
use crate::traits::{CacheItem, Dispose};

const TAG_SHIFT: u32 = 62;
const COUNT_MASK: u64 = (1 << TAG_SHIFT) - 1;
const TAG_MASK: u64 = !COUNT_MASK;

const TAG_ACTIVE: u64 = 0;
const TAG_DRAINING: u64 = 1 << TAG_SHIFT;
const TAG_DISPOSED: u64 = 2 << TAG_SHIFT;

/// Hosts an object whose real disposal must wait until all active uses have
/// ended *and* disposal has been requested.
///
/// The hosted object is owned for the disposer's whole lifetime; `dispose`
/// releases the resource it manages, while the memory goes away with the
/// last `Arc`.
pub struct AutoDisposer<T: Dispose> {
    object: T,
    state: AtomicU64,
}

impl<T: Dispose> AutoDisposer<T> {
    /// Host `object`. Starts in `Active(0)`.
    pub fn new(object: T) -> Self {
        Self {
            object,
            state: AtomicU64::new(TAG_ACTIVE),
        }
    }

    /// Begin a use: increments the use count and returns a guard that keeps
    /// the object alive until dropped.
    ///
    /// Fails with [`CacheError::InvalidState`] once draining has begun or
    /// disposal has completed; no new uses are admitted after
    /// [`retire`](Self::retire).
    pub fn acquire(this: &Arc<Self>) -> Result<UsageGuard<T>> {
        loop {
            let state = this.state.load(Ordering::Acquire);
            if state & TAG_MASK != TAG_ACTIVE {
                return Err(CacheError::InvalidState(
                    "disposer is draining or disposed",
                ));
            }
            if this
                .state
                .compare_exchange_weak(state, state + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(UsageGuard {
                    disposer: Arc::clone(this),
                });
            }
        }
    }

    /// Request disposal. One-way and idempotent.
    ///
    /// Disposes immediately when no uses are active, otherwise marks the
    /// disposer draining and defers disposal to the last guard release.
    /// Returns `true` iff this call performed the disposal itself.
    pub fn retire(&self) -> bool {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state & TAG_MASK != TAG_ACTIVE {
                // Already draining or disposed; nothing to do.
                return false;
            }
            let count = state & COUNT_MASK;
            let target = if count == 0 {
                TAG_DISPOSED
            } else {
                TAG_DRAINING | count
            };
            if self
                .state
                .compare_exchange_weak(state, target, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                if count == 0 {
                    self.object.dispose();
                    return true;
                }
                return false;
            }
        }
    }

    /// End a use. Called by [`UsageGuard::drop`].
    fn release(&self) {
        loop {
            let state = self.state.load(Ordering::Acquire);
            let tag = state & TAG_MASK;
            let count = state & COUNT_MASK;
            debug_assert!(count > 0, "release without a matching acquire");
            debug_assert!(tag != TAG_DISPOSED, "guard outlived disposal");
            let next = count.saturating_sub(1);
            let target = if tag == TAG_DRAINING && next == 0 {
                TAG_DISPOSED
            } else {
                tag | next
            };
            if self
                .state
                .compare_exchange_weak(state, target, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                if tag == TAG_DRAINING && next == 0 {
                    self.object.dispose();
                }
                return;
            }
        }
    }

    /// Number of currently active uses.
    pub fn usage_count(&self) -> u64 {
        self.state.load(Ordering::Acquire) & COUNT_MASK
    }

    /// Whether new uses are still admitted.
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) & TAG_MASK == TAG_ACTIVE
    }

    /// Whether disposal has been requested but guards are still out.
    pub fn is_draining(&self) -> bool {
        self.state.load(Ordering::Acquire) & TAG_MASK == TAG_DRAINING
    }

    /// Whether the hosted object has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) & TAG_MASK == TAG_DISPOSED
    }
}

impl<T: Dispose> fmt::Debug for AutoDisposer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load(Ordering::Acquire);
        let tag = match state & TAG_MASK {
            TAG_DRAINING => "draining",
            TAG_DISPOSED => "disposed",
            _ => "active",
        };
        f.debug_struct("AutoDisposer")
            .field("state", &tag)
            .field("usage_count", &(state & COUNT_MASK))
            .finish()
    }
}

/// Cached `AutoDisposer`s never receive a direct dispose from the store:
/// removal and eviction go through [`retire`](AutoDisposer::retire), and
/// draining hosts count as unusable so the `Tidy` strategy reclaims them.
impl<T> CacheItem for AutoDisposer<T>
where
    T: Dispose + Send + Sync + 'static,
{
    fn can_use(&self) -> bool {
        self.is_active()
    }

    fn request_dispose(&self) {
        self.retire();
    }
}

/// Scoped handle that keeps a shared disposable object alive for its
/// duration. Produced by [`AutoDisposer::acquire`]; releasing (dropping) it
/// performs the deferred disposal when it is the last use of a draining
/// disposer.
pub struct UsageGuard<T: Dispose> {
    disposer: Arc<AutoDisposer<T>>,
}

impl<T: Dispose> UsageGuard<T> {
    /// The disposer this guard holds a use on.
    pub fn disposer(&self) -> &Arc<AutoDisposer<T>> {
        &self.disposer
    }
}

impl<T: Dispose> Deref for UsageGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.disposer.object
    }
}

impl<T: Dispose> Drop for UsageGuard<T> {
    fn drop(&mut self) {
        self.disposer.release();
    }
}

impl<T: Dispose> fmt::Debug for UsageGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageGuard")
            .field("disposer", &self.disposer)
            .finish()
    }
}
