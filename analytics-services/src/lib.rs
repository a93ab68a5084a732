//! Caching and analytics services for the Injective Market Analytics service
//!
//! This crate holds the cache, request coalescing, rate limiting, and the
//! pure analytics engines, and wires them together in [`AnalyticsService`].

pub mod analytics_service;
pub mod cache_store;
pub mod coalesce;
pub mod comparator;
pub mod metrics_engine;
pub mod rate_limiter;
pub mod signal;
pub mod trending;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use analytics_service::{
    AnalyticsService, CacheKey, CachedValue, HealthReport, DEFAULT_ORDERBOOK_DEPTH,
    DEFAULT_TRADE_LIMIT, MAX_ORDERBOOK_DEPTH, MAX_TRADE_LIMIT,
};
pub use cache_store::{CacheStats, CacheStore};
pub use coalesce::RequestCoalescer;
pub use comparator::compare;
pub use metrics_engine::MetricsEngine;
pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use signal::SignalGenerator;
pub use trending::TrendingRanker;
