//! Integration tests for request coordination: deduplication,
//! stale-while-revalidate, and cancellation semantics.

use media_catalog_bot::api::RetryPolicy;
use media_catalog_bot::data::{CacheStore, RequestCoordinator};
use media_catalog_bot::error::FetchError;
use media_catalog_bot::utils::CancelToken;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_policy(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::from_millis(1), Duration::from_millis(5))
}

fn setup(retries: u32) -> (Arc<CacheStore>, Arc<RequestCoordinator>) {
    let cache = Arc::new(CacheStore::new("test:", 50));
    let coordinator = Arc::new(RequestCoordinator::new(
        Arc::clone(&cache),
        fast_policy(retries),
    ));
    (cache, coordinator)
}

#[tokio::test]
async fn concurrent_resolves_share_one_fetch() {
    let (_cache, coordinator) = setup(0);
    let calls = Arc::new(AtomicU32::new(0));
    let make_fetcher = |calls: Arc<AtomicU32>| {
        move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<Value, FetchError>(json!(["first"]))
            }
        }
    };

    let (a, b) = tokio::join!(
        coordinator.resolve("k", Duration::from_secs(60), make_fetcher(calls.clone())),
        coordinator.resolve("k", Duration::from_secs(60), make_fetcher(calls.clone())),
    );

    assert_eq!(a.unwrap(), json!(["first"]));
    assert_eq!(b.unwrap(), json!(["first"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fresh_cache_hits_skip_the_network() {
    let (cache, coordinator) = setup(0);
    cache.set("k", json!("cached"), Duration::from_secs(60));

    let calls = Arc::new(AtomicU32::new(0));
    let counting = calls.clone();
    let value = coordinator
        .resolve("k", Duration::from_secs(60), move || {
            let calls = counting.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Value, FetchError>(json!("network"))
            }
        })
        .await
        .unwrap();

    assert_eq!(value, json!("cached"));
    coordinator.wait_idle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_value_served_while_background_refresh_runs() {
    let (cache, coordinator) = setup(0);
    cache.set("k", json!("old"), Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let calls = Arc::new(AtomicU32::new(0));
    let counting = calls.clone();
    let first = coordinator
        .resolve("k", Duration::from_secs(60), move || {
            let calls = counting.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Value, FetchError>(json!("new"))
            }
        })
        .await
        .unwrap();
    // The stale answer comes back without waiting for the refresh.
    assert_eq!(first, json!("old"));

    coordinator.wait_idle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = coordinator
        .resolve("k", Duration::from_secs(60), move || async move {
            Ok::<Value, FetchError>(json!("never"))
        })
        .await
        .unwrap();
    assert_eq!(second, json!("new"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn callers_during_background_refresh_join_it() {
    let (cache, coordinator) = setup(0);
    cache.set("k", json!("old"), Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let calls = Arc::new(AtomicU32::new(0));
    let counting = calls.clone();
    let first = coordinator
        .resolve("k", Duration::from_secs(60), move || {
            let calls = counting.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<Value, FetchError>(json!("new"))
            }
        })
        .await
        .unwrap();
    assert_eq!(first, json!("old"));

    // Arrives while the refresh is in flight: coalesces onto it instead of
    // fetching again, and observes the refreshed value.
    let joined = coordinator
        .resolve("k", Duration::from_secs(60), move || async move {
            Ok::<Value, FetchError>(json!("never"))
        })
        .await
        .unwrap();
    assert_eq!(joined, json!("new"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    coordinator.wait_idle().await;
}

#[tokio::test]
async fn failed_fetch_leaves_key_immediately_retryable() {
    let (_cache, coordinator) = setup(0);
    let calls = Arc::new(AtomicU32::new(0));
    let make_fetcher = |calls: Arc<AtomicU32>| {
        move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, FetchError>(FetchError::Network("connection reset".to_string()))
            }
        }
    };

    let first = coordinator
        .resolve("k", Duration::from_secs(60), make_fetcher(calls.clone()))
        .await;
    assert!(first.is_err());

    let second = coordinator
        .resolve("k", Duration::from_secs(60), make_fetcher(calls.clone()))
        .await;
    assert!(second.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    coordinator.wait_idle().await;
}

#[tokio::test]
async fn cancellation_is_not_retried() {
    let (_cache, coordinator) = setup(3);
    let token = CancelToken::new();
    token.cancel();

    let calls = Arc::new(AtomicU32::new(0));
    let counting = calls.clone();
    let shared_token = token.clone();
    let result = coordinator
        .resolve("k", Duration::from_secs(60), move || {
            let calls = counting.clone();
            let token = shared_token.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if token.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                Ok(json!("unreachable"))
            }
        })
        .await;

    assert!(matches!(result, Err(FetchError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    coordinator.wait_idle().await;
}

#[tokio::test]
async fn errors_are_not_written_to_the_cache() {
    let (cache, coordinator) = setup(0);
    let result = coordinator
        .resolve("k", Duration::from_secs(60), move || async move {
            Err::<Value, FetchError>(FetchError::Upstream {
                status: 500,
                endpoint: "catalog/movie/trending".to_string(),
            })
        })
        .await;
    assert!(result.is_err());
    assert!(cache.get("k").is_none());
    coordinator.wait_idle().await;
}
