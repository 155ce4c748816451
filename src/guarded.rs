//! Guarded access to cached `AutoDisposer`-hosted items, with retry.
//!
//! Fetching an entry and acquiring a usage guard are two steps; between them
//! the entry can be evicted and its disposer retired. These helpers close
//! that window: when the acquire fails because the disposer is draining or
//! disposed while the store itself is still open, the stale entry is
//! dropped from the store and the whole fetch retried. A fresh fetch either
//! observes a newer revision, recreates the item through the factory, or
//! reports the key absent. The race never surfaces as an error; every other
//! failure propagates unchanged.

use std::future::Future;

use crate::disposer::{AutoDisposer, UsageGuard};
use crate::entry::EntryOptions;
use crate::error::{BoxError, CacheError, Result};
use crate::store::CacheStore;
use crate::traits::Dispose;

/// Fetch `key` and acquire a usage guard on the hosted object.
///
/// Returns `Ok(None)` when the key is absent.
pub fn get_guarded<T>(
    store: &CacheStore<AutoDisposer<T>>,
    key: &str,
) -> Result<Option<UsageGuard<T>>>
where
    T: Dispose + Send + Sync + 'static,
{
    loop {
        let Some(entry) = store.get(key)? else {
            return Ok(None);
        };
        match AutoDisposer::acquire(entry.item()) {
            Ok(guard) => return Ok(Some(guard)),
            Err(CacheError::InvalidState(_)) if !store.is_closed() => {
                // Concurrently retired; drop the stale mapping and refetch.
                store.remove_entry(&entry)?;
            },
            Err(err) => return Err(err),
        }
    }
}

/// Async variant of [`get_guarded`].
pub async fn get_guarded_async<T>(
    store: &CacheStore<AutoDisposer<T>>,
    key: &str,
) -> Result<Option<UsageGuard<T>>>
where
    T: Dispose + Send + Sync + 'static,
{
    loop {
        let Some(entry) = store.get_async(key).await? else {
            return Ok(None);
        };
        match AutoDisposer::acquire(entry.item()) {
            Ok(guard) => return Ok(Some(guard)),
            Err(CacheError::InvalidState(_)) if !store.is_closed() => {
                store.remove_entry_async(&entry).await?;
            },
            Err(err) => return Err(err),
        }
    }
}

/// Fetch-or-create `key` and acquire a usage guard on the hosted object.
///
/// The factory may run more than once across retries (each time the freshly
/// created disposer was retired before a guard could be taken), but at most
/// once per missing-key race, as guaranteed by
/// [`CacheStore::get_or_create`].
pub fn get_or_create_guarded<T, F>(
    store: &CacheStore<AutoDisposer<T>>,
    key: &str,
    options: EntryOptions,
    mut factory: F,
) -> Result<UsageGuard<T>>
where
    T: Dispose + Send + Sync + 'static,
    F: FnMut(&str) -> std::result::Result<AutoDisposer<T>, BoxError>,
{
    loop {
        let entry = store.get_or_create(key, options.clone(), &mut factory)?;
        match AutoDisposer::acquire(entry.item()) {
            Ok(guard) => return Ok(guard),
            Err(CacheError::InvalidState(_)) if !store.is_closed() => {
                store.remove_entry(&entry)?;
            },
            Err(err) => return Err(err),
        }
    }
}

/// Async variant of [`get_or_create_guarded`].
pub async fn get_or_create_guarded_async<T, F, Fut>(
    store: &CacheStore<AutoDisposer<T>>,
    key: &str,
    options: EntryOptions,
    mut factory: F,
) -> Result<UsageGuard<T>>
where
    T: Dispose + Send + Sync + 'static,
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = std::result::Result<AutoDisposer<T>, BoxError>>,
{
    loop {
        let entry = store
            .get_or_create_async(key, options.clone(), &mut factory)
            .await?;
        match AutoDisposer::acquire(entry.item()) {
            Ok(guard) => return Ok(guard),
            Err(CacheError::InvalidState(_)) if !store.is_closed() => {
                store.remove_entry_async(&entry).await?;
            },
            Err(err) => return Err(err),
        }
    }
}
