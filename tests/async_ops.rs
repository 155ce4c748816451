// ==============================================
// ASYNC OPERATION TESTS (integration)
// ==============================================
//
// Exercises the `_async` surface on a multi-threaded runtime. Only the
// async variants appear here: the blocking variants would panic if used
// from inside a runtime worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stashkit::prelude::*;

#[derive(Default)]
struct Conn {
    closed: AtomicUsize,
}

impl Dispose for Conn {
    fn dispose(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ==============================================
// Basic round trips
// ==============================================

#[tokio::test(flavor = "multi_thread")]
async fn add_get_remove_async() {
    let cache: CacheStore<String> = CacheBuilder::new(8).build();

    cache
        .add_async("k", "v".to_string(), EntryOptions::new())
        .await
        .unwrap();
    let entry = cache.get_async("k").await.unwrap().expect("present");
    assert_eq!(entry.item().as_str(), "v");

    let removed = cache.try_remove_async("k").await.unwrap();
    assert!(removed.is_some());
    assert!(cache.get_async("k").await.unwrap().is_none());
    assert_eq!(cache.len_async().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_required_async_reports_not_found() {
    let cache: CacheStore<String> = CacheBuilder::new(8).build();
    cache
        .add_async("k", "v".to_string(), EntryOptions::new())
        .await
        .unwrap();

    assert_eq!(cache.get_required_async("k").await.unwrap().key(), "k");
    let err = cache.get_required_async("absent").await.unwrap_err();
    assert!(matches!(err, CacheError::NotFound(key) if key == "absent"));
}

// ==============================================
// Factory stampede across tasks
// ==============================================

#[tokio::test(flavor = "multi_thread")]
async fn task_stampede_runs_the_factory_once() {
    const TASKS: usize = 16;

    let cache: Arc<CacheStore<String>> = Arc::new(CacheBuilder::new(32).build());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(TASKS);
    for _ in 0..TASKS {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_create_async("shared", EntryOptions::new(), |key| {
                    let calls = Arc::clone(&calls);
                    let key = key.to_string();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok(format!("value-for-{key}"))
                    }
                })
                .await
                .unwrap()
        }));
    }

    let mut entries = Vec::with_capacity(TASKS);
    for h in handles {
        entries.push(h.await.unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for entry in &entries {
        assert!(Arc::ptr_eq(entry, &entries[0]));
    }
}

// ==============================================
// Guarded access
// ==============================================

#[tokio::test(flavor = "multi_thread")]
async fn guarded_async_acquires_and_releases() {
    let cache: CacheStore<AutoDisposer<Conn>> = CacheBuilder::new(8).build();
    cache
        .add_async("c", AutoDisposer::new(Conn::default()), EntryOptions::new())
        .await
        .unwrap();

    let guard = get_guarded_async(&cache, "c").await.unwrap().expect("guard");
    assert_eq!(guard.disposer().usage_count(), 1);

    let disposer = Arc::clone(guard.disposer());
    drop(guard);
    assert_eq!(disposer.usage_count(), 0);
    assert!(disposer.is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn guarded_async_recreates_after_retire() {
    let cache: CacheStore<AutoDisposer<Conn>> = CacheBuilder::new(8).build();
    let entry = cache
        .add_async("c", AutoDisposer::new(Conn::default()), EntryOptions::new())
        .await
        .unwrap();
    entry.item().retire();

    let created = Arc::new(AtomicUsize::new(0));
    let guard = {
        let created = Arc::clone(&created);
        get_or_create_guarded_async(&cache, "c", EntryOptions::new(), move |_| {
            let created = Arc::clone(&created);
            async move {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(AutoDisposer::new(Conn::default()))
            }
        })
        .await
        .unwrap()
    };

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(guard.disposer().is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn guard_outlives_async_removal() {
    let cache: CacheStore<AutoDisposer<Conn>> = CacheBuilder::new(8).build();
    cache
        .add_async("c", AutoDisposer::new(Conn::default()), EntryOptions::new())
        .await
        .unwrap();

    let guard = get_guarded_async(&cache, "c").await.unwrap().expect("guard");
    cache.try_remove_async("c").await.unwrap();

    let disposer = Arc::clone(guard.disposer());
    assert!(disposer.is_draining());
    assert_eq!(guard.closed.load(Ordering::SeqCst), 0);

    drop(guard);
    assert!(disposer.is_disposed());
    assert_eq!(disposer.usage_count(), 0);
}

// ==============================================
// Factory failure
// ==============================================

#[tokio::test(flavor = "multi_thread")]
async fn failed_factory_stores_nothing() {
    let cache: CacheStore<String> = CacheBuilder::new(8).build();

    let err = cache
        .get_or_create_async("k", EntryOptions::new(), |_| async {
            Err::<String, BoxError>("backend unavailable".into())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Factory(_)));
    assert!(!cache.contains_key_async("k").await);

    // A factory observing cooperative cancellation fails with `Cancelled`,
    // unwrapped.
    let err = cache
        .get_or_create_async("k", EntryOptions::new(), |_| async {
            Err::<String, BoxError>(Box::new(CacheError::Cancelled))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Cancelled));

    // A later attempt is free to succeed.
    cache
        .get_or_create_async("k", EntryOptions::new(), |_| async {
            Ok("ok".to_string())
        })
        .await
        .unwrap();
    assert!(cache.contains_key_async("k").await);
}

// ==============================================
// Clear and close
// ==============================================

#[tokio::test(flavor = "multi_thread")]
async fn clear_async_disposes_items_on_request() {
    let cache: CacheStore<AutoDisposer<Conn>> = CacheBuilder::new(8).build();
    let entry = cache
        .add_async("c", AutoDisposer::new(Conn::default()), EntryOptions::new())
        .await
        .unwrap();
    let disposer = Arc::clone(entry.item());
    drop(entry);

    cache.clear_async(true).await.unwrap();

    assert_eq!(cache.len_async().await, 0);
    assert!(disposer.is_disposed());
    assert!(!cache.is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn close_async_rejects_further_operations() {
    let cache: CacheStore<String> = CacheBuilder::new(8).build();
    cache
        .add_async("k", "v".to_string(), EntryOptions::new())
        .await
        .unwrap();

    cache.close_async(true).await;

    assert!(cache.is_closed());
    assert!(matches!(
        cache.add_async("x", "y".to_string(), EntryOptions::new()).await,
        Err(CacheError::AlreadyDisposed)
    ));
    assert!(matches!(
        cache.get_async("k").await,
        Err(CacheError::AlreadyDisposed)
    ));

    // Idempotent.
    cache.close_async(true).await;
    assert!(cache.is_closed());
}
