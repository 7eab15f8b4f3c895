//! Stale-while-revalidate request coordination.
//!
//! Every distinct logical request gets at most one concurrent network
//! execution; callers holding a non-hard-expired cached value never wait on
//! the network.

use crate::api::RetryPolicy;
use crate::data::cache::CacheStore;
use crate::error::{FetchError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::{debug, error, warn};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;

/// Registry of detached tasks, so fire-and-forget work is observed rather
/// than silently lost and tests can await quiescence.
pub struct TaskSupervisor {
    tasks: Mutex<JoinSet<()>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.lock().await.spawn(task);
    }

    /// Awaits completion of every registered task.
    pub async fn wait_idle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!("supervised task failed to join: {}", err);
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines the cache with an in-flight registry to give every request key
/// at-most-one concurrent execution and stale-while-revalidate semantics.
pub struct RequestCoordinator {
    cache: Arc<CacheStore>,
    retry: RetryPolicy,
    in_flight: Arc<DashMap<String, SharedFetch>>,
    supervisor: Arc<TaskSupervisor>,
}

impl RequestCoordinator {
    pub fn new(cache: Arc<CacheStore>, retry: RetryPolicy) -> Self {
        Self {
            cache,
            retry,
            in_flight: Arc::new(DashMap::new()),
            supervisor: Arc::new(TaskSupervisor::new()),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Awaits any background revalidations currently in flight. Shutdown
    /// paths and tests use this to observe refreshes deterministically.
    pub async fn wait_idle(&self) {
        self.supervisor.wait_idle().await;
    }

    /// Resolve `key` to a JSON payload.
    ///
    /// An in-flight fetch for the key is joined rather than duplicated. A
    /// fresh cached value returns without touching the network. A stale one
    /// is returned immediately while a background refresh revalidates it;
    /// refresh failures are logged, never surfaced, since the caller already
    /// has an answer. Only a cold cache makes the caller wait.
    pub async fn resolve<F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<Value>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        if let Some(pending) = self.in_flight.get(key).map(|entry| entry.value().clone()) {
            debug!("joining in-flight request for {}", key);
            return pending.await;
        }

        match self.cache.get(key) {
            Some(cached) if !cached.is_stale => {
                debug!("cache hit (fresh) for {}", key);
                Ok(cached.data)
            }
            Some(cached) => {
                debug!("cache hit (stale) for {}, revalidating in background", key);
                let _ = self.launch_fetch(key, ttl, fetcher, true).await;
                Ok(cached.data)
            }
            None => {
                debug!("cache miss for {}", key);
                let pending = self.launch_fetch(key, ttl, fetcher, false).await;
                pending.await
            }
        }
    }

    /// Registers the fetch in the in-flight map *before* the first await, so
    /// concurrent callers coalesce onto it, and drives it to completion on a
    /// supervised task independent of any one caller.
    async fn launch_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        mut fetcher: F,
        background: bool,
    ) -> SharedFetch
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let retry = self.retry.clone();
        let fetch_key = key.to_string();

        let fetch = async move {
            let result = retry.execute(move || fetcher()).await;
            if let Ok(value) = &result {
                cache.set(&fetch_key, value.clone(), ttl);
            }
            // Removal is unconditional so a failed key is immediately retryable.
            in_flight.remove(&fetch_key);
            result
        }
        .boxed()
        .shared();

        let registered = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                slot.insert(fetch.clone());
                fetch
            }
        };

        let driver = registered.clone();
        let driver_key = key.to_string();
        self.supervisor
            .spawn(async move {
                match driver.await {
                    Ok(_) => {}
                    Err(FetchError::Cancelled) => {
                        debug!("request for {} withdrawn", driver_key)
                    }
                    Err(err) if background => {
                        warn!("background revalidation for {} failed: {}", driver_key, err)
                    }
                    Err(err) => debug!("request for {} failed: {}", driver_key, err),
                }
            })
            .await;

        registered
    }
}
