//! stashkit: keyed in-process cache with a pluggable eviction-strategy
//! chain and reference-counted lifecycle guards for shared disposable
//! objects.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod disposer;
pub mod entry;
pub mod error;
pub mod guarded;
pub mod prelude;
pub mod registry;
pub mod store;
pub mod strategy;
pub mod traits;
