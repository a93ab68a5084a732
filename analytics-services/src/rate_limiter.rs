//! Per-client request rate limiter
//!
//! Fixed-window counting keyed by client identity. Each key gets at most
//! `max_requests` admissions per `period`; the window starts with the
//! first request after the previous one lapsed.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use analytics_core::{AnalyticsError, AnalyticsResult, RateLimitConfig};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Rate limiter shared by every request handler
///
/// The counter update for a key happens under that key's shard lock, so
/// concurrent requests from one client never admit more than the budget.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    period: Duration,
    /// Name for logging purposes
    name: String,
    total_requests: AtomicU64,
    rejected_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, period: Duration, name: &str) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            period,
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.period, "api")
    }

    /// Admit or reject one request for `key`
    ///
    /// A rejection carries the time left until the key's window resets.
    pub fn check(&self, key: &str) -> AnalyticsResult<()> {
        let request_num = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Instant::now();

        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.period {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.max_requests {
            window.count += 1;
            debug!(
                "[RATE_LIMITER:{}] #{} admitted {} ({}/{})",
                self.name, request_num, key, window.count, self.max_requests
            );
            return Ok(());
        }

        let retry_after = self
            .period
            .saturating_sub(now.duration_since(window.started));
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
        info!(
            "[RATE_LIMITER:{}] #{} rejected {}, retry in {:?}",
            self.name, request_num, key, retry_after
        );

        Err(AnalyticsError::RateLimited { retry_after })
    }

    /// Boolean form of [`RateLimiter::check`]
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Drop windows that have lapsed, returning how many were removed
    pub fn prune_idle(&self) -> usize {
        let before = self.windows.len();
        let now = Instant::now();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.period);
        before.saturating_sub(self.windows.len())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Get statistics about this rate limiter
    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            tracked_clients: self.windows.len(),
            max_requests: self.max_requests,
            period_secs: self.period.as_secs(),
            name: self.name.clone(),
        }
    }
}

/// Statistics about rate limiter usage
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub tracked_clients: usize,
    pub max_requests: u32,
    pub period_secs: u64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_budget_then_reject() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60), "test");

        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }

        match limiter.check("10.0.0.1") {
            Err(AnalyticsError::RateLimited { retry_after }) => {
                assert!(retry_after > Duration::from_secs(59));
                assert!(retry_after <= Duration::from_secs(60));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), "test");

        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[tokio::test]
    async fn test_next_window_admits_again() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50), "test");

        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(limiter.allow("k"));
    }

    #[tokio::test]
    async fn test_prune_idle_windows() {
        let limiter = RateLimiter::new(5, Duration::from_millis(30), "test");
        limiter.allow("a");
        limiter.allow("b");
        assert_eq!(limiter.prune_idle(), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(limiter.prune_idle(), 2);
        assert_eq!(limiter.stats().tracked_clients, 0);
    }

    /// Concurrent callers sharing one key never exceed the budget
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_respect_budget() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60), "concurrent_test"));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.allow("shared") }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 10);
        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 50);
        assert_eq!(stats.rejected_requests, 40);
    }
}
