//! Analytics service
//!
//! Ties the data port, the cache, and the analytics engines together. Every
//! operation resolves a cache key: a live cache entry is returned as is,
//! otherwise one coalesced fetch computes the value, stores it, and hands it
//! to every caller waiting on the same key.

use chrono::{DateTime, Utc};
use futures::future::{self, join_all, try_join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use analytics_core::{
    AnalyticsConfig, AnalyticsError, AnalyticsResult, ComparisonResult, MarketDataPort,
    MarketDescriptor, MarketKind, MarketMetrics, MarketSummary, OrderBookSnapshot, TradeRecord,
    TradingSignal, TrendingMarket,
};

use crate::cache_store::{CacheStats, CacheStore};
use crate::coalesce::RequestCoalescer;
use crate::comparator;
use crate::metrics_engine::MetricsEngine;
use crate::signal::SignalGenerator;
use crate::trending::TrendingRanker;

pub const MAX_ORDERBOOK_DEPTH: usize = 100;
pub const DEFAULT_ORDERBOOK_DEPTH: usize = 20;
pub const MAX_TRADE_LIMIT: usize = 500;
pub const DEFAULT_TRADE_LIMIT: usize = 50;

/// Identity of a cached or in-flight computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Markets,
    OrderBook { market_id: String, depth: usize },
    Trades { market_id: String, limit: usize },
    Summary(String),
    Metrics(String),
    Signal(String),
    Trending { limit: usize },
    Comparison(Vec<String>),
}

impl CacheKey {
    /// Keys fetched with a single upstream call
    ///
    /// Every other key is derived from cached entries and lives no longer
    /// than the earliest-expiring entry it was built from.
    fn is_upstream(&self) -> bool {
        matches!(
            self,
            CacheKey::Markets | CacheKey::OrderBook { .. } | CacheKey::Trades { .. }
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Markets => write!(f, "markets"),
            CacheKey::OrderBook { market_id, depth } => write!(f, "orderbook:{}:{}", market_id, depth),
            CacheKey::Trades { market_id, limit } => write!(f, "trades:{}:{}", market_id, limit),
            CacheKey::Summary(id) => write!(f, "summary:{}", id),
            CacheKey::Metrics(id) => write!(f, "metrics:{}", id),
            CacheKey::Signal(id) => write!(f, "signal:{}", id),
            CacheKey::Trending { limit } => write!(f, "trending:{}", limit),
            CacheKey::Comparison(ids) => write!(f, "compare:{}", ids.join(",")),
        }
    }
}

/// Payloads stored in the cache
#[derive(Debug, Clone)]
pub enum CachedValue {
    Markets(Vec<MarketDescriptor>),
    OrderBook(OrderBookSnapshot),
    Trades(Vec<TradeRecord>),
    Summary(MarketSummary),
    Metrics(MarketMetrics),
    Signal(TradingSignal),
    Trending(Vec<TrendingMarket>),
    Comparison(ComparisonResult),
}

/// Conversion between a typed result and its cache payload
trait Cacheable: Sized + Send + 'static {
    fn wrap(self) -> CachedValue;
    fn unwrap_from(value: CachedValue) -> Option<Self>;
}

macro_rules! impl_cacheable {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl Cacheable for $ty {
                fn wrap(self) -> CachedValue {
                    CachedValue::$variant(self)
                }

                fn unwrap_from(value: CachedValue) -> Option<Self> {
                    match value {
                        CachedValue::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_cacheable! {
    Markets => Vec<MarketDescriptor>,
    OrderBook => OrderBookSnapshot,
    Trades => Vec<TradeRecord>,
    Summary => MarketSummary,
    Metrics => MarketMetrics,
    Signal => TradingSignal,
    Trending => Vec<TrendingMarket>,
    Comparison => ComparisonResult,
}

/// A resolved payload and the instant it stops being fresh
type Resolved = (CachedValue, Instant);

tokio::task_local! {
    /// Earliest expiry among the entries read while computing a derived value
    static INPUT_EXPIRY: Cell<Option<Instant>>;
}

/// Run `work`, collecting the earliest expiry of the entries it resolves
async fn track_inputs<F: Future>(work: F) -> (F::Output, Option<Instant>) {
    INPUT_EXPIRY
        .scope(Cell::new(None), async move {
            let output = work.await;
            (output, INPUT_EXPIRY.with(Cell::get))
        })
        .await
}

/// Record an entry read by the derived value being computed, if any
fn note_input_expiry(expires_at: Instant) {
    let _ = INPUT_EXPIRY.try_with(|earliest| {
        let next = match earliest.get() {
            Some(current) => current.min(expires_at),
            None => expires_at,
        };
        earliest.set(Some(next));
    });
}

/// Health report for the operational surface
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub network: String,
    pub cache: CacheStats,
    pub in_flight: usize,
    pub timestamp: DateTime<Utc>,
}

struct Inner {
    port: Arc<dyn MarketDataPort>,
    cache: Arc<CacheStore<CacheKey, CachedValue>>,
    coalescer: RequestCoalescer<CacheKey, Resolved>,
    metrics: MetricsEngine,
    signals: SignalGenerator,
    trending: TrendingRanker,
    config: AnalyticsConfig,
}

/// Cached, coalesced market analytics
///
/// Cheap to clone; clones share the cache and the in-flight fetches.
#[derive(Clone)]
pub struct AnalyticsService {
    inner: Arc<Inner>,
}

impl AnalyticsService {
    pub fn new(port: Arc<dyn MarketDataPort>, config: AnalyticsConfig) -> Self {
        info!(
            "Creating analytics service (ttl {:?}, capacity {}, upstream timeout {:?})",
            config.cache.ttl, config.cache.max_entries, config.upstream.request_timeout
        );

        Self {
            inner: Arc::new(Inner {
                port,
                cache: Arc::new(CacheStore::from_config(&config.cache)),
                coalescer: RequestCoalescer::new(config.upstream.request_timeout),
                metrics: MetricsEngine::new(config.metrics.clone()),
                signals: SignalGenerator::new(config.signal.clone()),
                trending: TrendingRanker::new(config.trending.clone()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.inner.config
    }

    /// Look up `key` in the cache, or compute it once for all concurrent callers
    async fn resolve<T, F, Fut>(&self, key: CacheKey, fetch: F) -> AnalyticsResult<T>
    where
        T: Cacheable,
        F: FnOnce(AnalyticsService) -> Fut + Send + 'static,
        Fut: Future<Output = AnalyticsResult<T>> + Send + 'static,
    {
        let (value, expires_at) = self.resolve_entry(key.clone(), fetch).await?;
        note_input_expiry(expires_at);
        unwrap_cached(&key, value)
    }

    async fn resolve_entry<T, F, Fut>(&self, key: CacheKey, fetch: F) -> AnalyticsResult<Resolved>
    where
        T: Cacheable,
        F: FnOnce(AnalyticsService) -> Fut + Send + 'static,
        Fut: Future<Output = AnalyticsResult<T>> + Send + 'static,
    {
        if let Some((hit, remaining)) = self.inner.cache.get_with_ttl(&key) {
            debug!("Cache hit for {}", key);
            return Ok((hit, Instant::now() + remaining));
        }
        debug!("Cache miss for {}", key);

        let upstream = key.is_upstream();
        let timeout = upstream.then_some(self.inner.config.upstream.request_timeout);
        let service = self.clone();
        let task_key = key.clone();

        self.inner
            .coalescer
            .run_with_timeout(key, timeout, move || -> BoxFuture<'static, AnalyticsResult<Resolved>> {
                // A fetch for this key may have completed since the miss above
                if let Some((hit, remaining)) = service.inner.cache.get_with_ttl(&task_key) {
                    return future::ready(Ok((hit, Instant::now() + remaining))).boxed();
                }

                async move {
                    let (result, inputs_expire) = if upstream {
                        (fetch(service.clone()).await, None)
                    } else {
                        track_inputs(fetch(service.clone())).await
                    };
                    let value = result?.wrap();

                    let mut ttl = service.inner.cache.default_ttl();
                    if let Some(deadline) = inputs_expire {
                        ttl = ttl.min(deadline.saturating_duration_since(Instant::now()));
                    }
                    if ttl.is_zero() {
                        debug!("Inputs of {} already expired, not caching", task_key);
                    } else {
                        service.inner.cache.set(task_key, value.clone(), ttl);
                    }
                    Ok::<_, AnalyticsError>((value, Instant::now() + ttl))
                }
                .boxed()
            })
            .await
    }

    /// All markets, optionally restricted to one kind
    #[instrument(skip(self))]
    pub async fn list_markets(&self, kind: Option<MarketKind>) -> AnalyticsResult<Vec<MarketDescriptor>> {
        let markets: Vec<MarketDescriptor> = self
            .resolve(CacheKey::Markets, |svc| async move {
                svc.inner.port.list_markets(None).await.map_err(|e| {
                    warn!("Failed to list markets: {}", e);
                    e
                })
            })
            .await?;

        Ok(match kind {
            Some(kind) => markets.into_iter().filter(|m| m.kind == kind).collect(),
            None => markets,
        })
    }

    /// Descriptor for a single market
    #[instrument(skip(self))]
    pub async fn market(&self, market_id: &str) -> AnalyticsResult<MarketDescriptor> {
        validate_market_id(market_id)?;
        self.list_markets(None)
            .await?
            .into_iter()
            .find(|m| m.market_id == market_id)
            .ok_or_else(|| AnalyticsError::not_found(format!("Market {} not found", market_id)))
    }

    /// Order book truncated to `depth` levels per side
    #[instrument(skip(self))]
    pub async fn orderbook(&self, market_id: &str, depth: usize) -> AnalyticsResult<OrderBookSnapshot> {
        validate_market_id(market_id)?;
        if !(1..=MAX_ORDERBOOK_DEPTH).contains(&depth) {
            return Err(AnalyticsError::invalid_input(format!(
                "depth must be between 1 and {}",
                MAX_ORDERBOOK_DEPTH
            )));
        }

        let id = market_id.to_string();
        let key = CacheKey::OrderBook { market_id: id.clone(), depth };
        self.resolve(key, move |svc| async move {
            let mut book = svc.inner.port.get_orderbook(&id, depth).await.map_err(|e| {
                warn!("Failed to fetch order book for {}: {}", id, e);
                e
            })?;
            book.truncate(depth);
            Ok::<_, AnalyticsError>(book)
        })
        .await
    }

    /// Most recent trades, oldest first; may be empty
    #[instrument(skip(self))]
    pub async fn trades(&self, market_id: &str, limit: usize) -> AnalyticsResult<Vec<TradeRecord>> {
        validate_market_id(market_id)?;
        if !(1..=MAX_TRADE_LIMIT).contains(&limit) {
            return Err(AnalyticsError::invalid_input(format!(
                "limit must be between 1 and {}",
                MAX_TRADE_LIMIT
            )));
        }

        let id = market_id.to_string();
        let key = CacheKey::Trades { market_id: id.clone(), limit };
        self.resolve(key, move |svc| async move {
            svc.inner.port.get_trades(&id, limit).await.map_err(|e| {
                warn!("Failed to fetch trades for {}: {}", id, e);
                e
            })
        })
        .await
    }

    /// Descriptor, book, and trade window for a market, fetched concurrently
    async fn snapshot(
        &self,
        market_id: &str,
    ) -> AnalyticsResult<(MarketDescriptor, OrderBookSnapshot, Vec<TradeRecord>)> {
        let metrics = self.inner.metrics.config();
        futures::try_join!(
            self.market(market_id),
            self.orderbook(market_id, metrics.orderbook_depth.min(MAX_ORDERBOOK_DEPTH)),
            self.trades(market_id, metrics.trade_window.min(MAX_TRADE_LIMIT)),
        )
    }

    /// Price, volume, and change over the summary window
    #[instrument(skip(self))]
    pub async fn market_summary(&self, market_id: &str) -> AnalyticsResult<MarketSummary> {
        validate_market_id(market_id)?;
        let id = market_id.to_string();
        self.resolve(CacheKey::Summary(id.clone()), move |svc| async move {
            let (market, book, trades) = svc.snapshot(&id).await?;
            svc.inner.metrics.summarize(&market, &book, &trades)
        })
        .await
    }

    /// Derived metrics for a market
    #[instrument(skip(self))]
    pub async fn metrics(&self, market_id: &str) -> AnalyticsResult<MarketMetrics> {
        validate_market_id(market_id)?;
        let id = market_id.to_string();
        self.resolve(CacheKey::Metrics(id.clone()), move |svc| async move {
            let (market, book, trades) = svc.snapshot(&id).await?;
            svc.inner.metrics.compute(&market, &book, &trades)
        })
        .await
    }

    /// Trading signal for a market
    ///
    /// A metrics failure fails the signal; no default metrics are used.
    #[instrument(skip(self))]
    pub async fn signal(&self, market_id: &str) -> AnalyticsResult<TradingSignal> {
        validate_market_id(market_id)?;
        let id = market_id.to_string();
        self.resolve(CacheKey::Signal(id.clone()), move |svc| async move {
            let metrics = svc.metrics(&id).await?;
            Ok::<_, AnalyticsError>(svc.inner.signals.generate(&metrics))
        })
        .await
    }

    /// Most active markets, at most `limit`
    ///
    /// Markets whose summary cannot be computed are left out of the ranking.
    #[instrument(skip(self))]
    pub async fn trending(&self, limit: usize) -> AnalyticsResult<Vec<TrendingMarket>> {
        let max_limit = self.inner.trending.config().max_limit;
        if !(1..=max_limit).contains(&limit) {
            return Err(AnalyticsError::invalid_input(format!(
                "limit must be between 1 and {}",
                max_limit
            )));
        }

        self.resolve(CacheKey::Trending { limit }, move |svc| async move {
            let markets = svc.list_markets(None).await?;
            let candidates: Vec<MarketDescriptor> = markets
                .into_iter()
                .take(svc.inner.trending.config().max_candidates)
                .collect();

            let results = join_all(candidates.iter().map(|m| {
                let svc = svc.clone();
                let id = m.market_id.clone();
                async move { svc.market_summary(&id).await }
            }))
            .await;

            let mut summaries = Vec::with_capacity(results.len());
            for (market, result) in candidates.iter().zip(results) {
                match result {
                    Ok(summary) => summaries.push(summary),
                    Err(e) => debug!("Skipping {} in trending: {}", market.market_id, e),
                }
            }

            Ok::<_, AnalyticsError>(svc.inner.trending.rank(&summaries, limit))
        })
        .await
    }

    /// Compare markets by price change and volume
    ///
    /// Duplicate identifiers are collapsed, keeping first-seen order. Any
    /// market that cannot be summarized fails the whole comparison.
    #[instrument(skip(self))]
    pub async fn compare(&self, market_ids: &[String]) -> AnalyticsResult<ComparisonResult> {
        let mut ids: Vec<String> = Vec::with_capacity(market_ids.len());
        for raw in market_ids {
            let id = raw.trim();
            if id.is_empty() {
                return Err(AnalyticsError::invalid_input("market identifiers must not be empty"));
            }
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }

        let max_markets = self.inner.config.compare.max_markets;
        if ids.is_empty() {
            return Err(AnalyticsError::invalid_input("at least one market identifier is required"));
        }
        if ids.len() > max_markets {
            return Err(AnalyticsError::invalid_input(format!(
                "at most {} markets can be compared",
                max_markets
            )));
        }

        self.resolve(CacheKey::Comparison(ids.clone()), move |svc| async move {
            let summaries = try_join_all(ids.into_iter().map(|id| {
                let svc = svc.clone();
                async move { svc.market_summary(&id).await }
            }))
            .await?;
            comparator::compare(summaries)
        })
        .await
    }

    /// Drop every cached entry, returning how many were removed
    pub fn clear_cache(&self) -> usize {
        self.inner.cache.clear()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            version: self.inner.config.server.version.clone(),
            network: self.inner.config.upstream.network.to_string(),
            cache: self.inner.cache.stats(),
            in_flight: self.inner.coalescer.in_flight(),
            timestamp: Utc::now(),
        }
    }

    /// Start the periodic purge of expired cache entries
    pub fn spawn_cache_sweeper(&self) -> JoinHandle<()> {
        self.inner
            .cache
            .spawn_sweeper(self.inner.config.cache.sweep_interval)
    }
}

fn unwrap_cached<T: Cacheable>(key: &CacheKey, value: CachedValue) -> AnalyticsResult<T> {
    T::unwrap_from(value)
        .ok_or_else(|| AnalyticsError::internal(format!("unexpected cached payload for {}", key)))
}

fn validate_market_id(market_id: &str) -> AnalyticsResult<()> {
    if market_id.trim().is_empty() {
        return Err(AnalyticsError::invalid_input("market identifier must not be empty"));
    }
    Ok(())
}
