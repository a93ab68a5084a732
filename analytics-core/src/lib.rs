//! Core types for the Injective Market Analytics service
//!
//! This crate defines the shared data structures used across the service:
//! raw market data as delivered by the chain, the derived analytics values,
//! the error taxonomy, configuration, and the port through which raw data
//! is fetched.

pub mod analytics;
pub mod config;
pub mod error;
pub mod market;
pub mod port;

pub use analytics::{
    ComparisonResult, MarketMetrics, PriceMomentum, Signal, TradingSignal, TrendingMarket,
    VolumeTrend,
};
pub use config::{
    AnalyticsConfig, CacheConfig, CompareConfig, ConfigError, MetricsConfig, Network,
    RateLimitConfig, ServerConfig, SignalConfig, SignalWeights, TrendingConfig, UpstreamConfig,
};
pub use error::{AnalyticsError, AnalyticsResult};
pub use market::{
    MarketDescriptor, MarketKind, MarketSummary, OrderBookLevel, OrderBookSnapshot, TradeRecord,
    TradeSide,
};
pub use port::MarketDataPort;
