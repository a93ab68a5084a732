//! Request coalescing
//!
//! Concurrent misses for the same key share one upstream fetch. The first
//! caller registers a pending fetch under the key; later callers await the
//! same shared result. The fetch runs on its own task, so a caller that
//! goes away does not cancel it for the others, and the in-flight marker is
//! removed only once the fetch has finished.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use analytics_core::{AnalyticsError, AnalyticsResult};

type SharedFetch<V> = Shared<BoxFuture<'static, AnalyticsResult<V>>>;

/// Per-key single-flight execution of fallible fetches
pub struct RequestCoalescer<K, V>
where
    V: Clone,
{
    in_flight: Arc<DashMap<K, SharedFetch<V>>>,
    /// Default upper bound on a single fetch
    timeout: Duration,
    started: AtomicU64,
    joined: AtomicU64,
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            timeout,
            started: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    /// Run `fetch` for `key`, or join the fetch already in flight for it
    ///
    /// `fetch` is only invoked when no fetch is pending for the key. A fetch
    /// that exceeds the timeout fails every waiter with `UpstreamTimeout`.
    pub async fn run<F>(&self, key: K, fetch: F) -> AnalyticsResult<V>
    where
        F: FnOnce() -> BoxFuture<'static, AnalyticsResult<V>>,
    {
        self.run_with_timeout(key, Some(self.timeout), fetch).await
    }

    /// Like [`RequestCoalescer::run`], with an explicit bound
    ///
    /// `None` leaves the fetch unbounded, for fetches that are themselves
    /// composed of bounded ones.
    pub async fn run_with_timeout<F>(
        &self,
        key: K,
        timeout: Option<Duration>,
        fetch: F,
    ) -> AnalyticsResult<V>
    where
        F: FnOnce() -> BoxFuture<'static, AnalyticsResult<V>>,
    {
        let shared = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => {
                self.joined.fetch_add(1, Ordering::Relaxed);
                debug!("Joining in-flight fetch for {:?}", key);
                pending.get().clone()
            }
            Entry::Vacant(slot) => {
                self.started.fetch_add(1, Ordering::Relaxed);

                let in_flight = Arc::clone(&self.in_flight);
                let task_key = key.clone();
                let work = fetch();

                let handle = tokio::spawn(async move {
                    let result = match timeout {
                        Some(limit) => match tokio::time::timeout(limit, work).await {
                            Ok(result) => result,
                            Err(_) => {
                                warn!("Fetch for {:?} timed out after {:?}", task_key, limit);
                                Err(AnalyticsError::UpstreamTimeout(limit))
                            }
                        },
                        None => work.await,
                    };
                    in_flight.remove(&task_key);
                    result
                });

                let shared = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(AnalyticsError::internal(format!("fetch task failed: {}", e))),
                    }
                }
                .boxed()
                .shared();

                slot.insert(shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Number of keys with a fetch currently pending
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Fetches started and joins onto pending fetches since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.started.load(Ordering::Relaxed),
            self.joined.load(Ordering::Relaxed),
        )
    }
}
