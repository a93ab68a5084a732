//! Service configuration
//!
//! Every tunable the analytics engine uses lives in an explicit struct with
//! named, defaulted fields. Thresholds and weights are policy, so they are
//! configuration rather than constants.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Injective network the service reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    /// Default chain LCD endpoint
    pub fn lcd_endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://sentry.lcd.injective.network:443",
            Network::Testnet => "https://testnet.sentry.lcd.injective.network:443",
        }
    }

    /// Default exchange indexer endpoint
    pub fn indexer_endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://sentry.exchange.grpc-web.injective.network:443",
            Network::Testnet => "https://testnet.sentry.exchange.grpc-web.injective.network:443",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            _ => Err(format!("Unknown network: {}", s)),
        }
    }
}

/// Cache Store settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default time-to-live of a cached value
    pub ttl: Duration,
    /// Capacity bound (total entry cost, one per entry by default)
    pub max_entries: usize,
    /// How often the background sweeper purges expired entries
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_entries: 1000,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Rate Limiter settings
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per client within one window
    pub max_requests: u32,
    /// Window length
    pub period: Duration,
    /// Key clients by the first `X-Forwarded-For` address instead of the
    /// peer address. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period: Duration::from_secs(60),
            trust_forwarded_for: false,
        }
    }
}

/// Raw data source settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub network: Network,
    /// Chain LCD REST endpoint (markets, order books)
    pub lcd_endpoint: String,
    /// Exchange indexer endpoint (trades)
    pub indexer_endpoint: String,
    /// Upper bound on a single upstream call
    pub request_timeout: Duration,
    /// Decimal places of on-chain prices
    pub price_decimals: u32,
    /// Decimal places of on-chain quantities
    pub quantity_decimals: u32,
}

impl UpstreamConfig {
    /// Settings for a network with its default endpoints
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            lcd_endpoint: network.lcd_endpoint().to_string(),
            indexer_endpoint: network.indexer_endpoint().to_string(),
            request_timeout: Duration::from_secs(10),
            price_decimals: 6,
            quantity_decimals: 18,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::for_network(Network::default())
    }
}

/// Metrics Engine settings
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Order book levels fetched per side
    pub orderbook_depth: usize,
    /// Trades fetched for the metrics window
    pub trade_window: usize,
    /// Half-width of the liquidity band around the midpoint, in percent
    pub liquidity_band_pct: f64,
    /// Resting quantity that maps to one liquidity point
    pub liquidity_divisor: f64,
    /// Recent/prior volume ratio above which volume is increasing
    pub volume_increase_ratio: f64,
    /// Recent/prior volume ratio below which volume is decreasing
    pub volume_decrease_ratio: f64,
    /// Absolute price change (percent) treated as noise
    pub momentum_threshold_pct: f64,
    /// Trailing window for summary volume and price change
    pub summary_window: chrono::Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            orderbook_depth: 20,
            trade_window: 100,
            liquidity_band_pct: 2.0,
            liquidity_divisor: 1000.0,
            volume_increase_ratio: 1.1,
            volume_decrease_ratio: 0.9,
            momentum_threshold_pct: 5.0,
            summary_window: chrono::Duration::hours(24),
        }
    }
}

/// Relative weights of the signal sub-scores
#[derive(Debug, Clone, Copy)]
pub struct SignalWeights {
    pub momentum: f64,
    pub volatility: f64,
    pub liquidity: f64,
    pub spread: f64,
    pub volume_trend: f64,
}

impl SignalWeights {
    pub fn total(&self) -> f64 {
        self.momentum + self.volatility + self.liquidity + self.spread + self.volume_trend
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            momentum: 0.35,
            volatility: 0.2,
            liquidity: 0.2,
            spread: 0.1,
            volume_trend: 0.15,
        }
    }
}

/// Signal Generator settings
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub weights: SignalWeights,
    /// Strength at or above which the signal is buy
    pub buy_threshold: u8,
    /// Strength at or below which the signal is sell
    pub sell_threshold: u8,
    /// Momentum sub-score points per percent of price change
    pub momentum_sensitivity: f64,
    /// Volatility at which the volatility sub-score halves
    pub volatility_reference: f64,
    /// Spread sub-score points lost per percent of spread
    pub spread_penalty: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            buy_threshold: 66,
            sell_threshold: 33,
            momentum_sensitivity: 5.0,
            volatility_reference: 0.02,
            spread_penalty: 20.0,
        }
    }
}

/// Trending Ranker settings
#[derive(Debug, Clone)]
pub struct TrendingConfig {
    /// Weight of normalized volume in the composite score
    pub volume_weight: f64,
    /// Weight of normalized absolute price change in the composite score
    pub price_change_weight: f64,
    /// Maximum number of listed markets summarized per ranking
    pub max_candidates: usize,
    /// Drop markets without any traded volume
    pub skip_inactive: bool,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            volume_weight: 0.6,
            price_change_weight: 0.4,
            max_candidates: 50,
            skip_inactive: true,
            default_limit: 10,
            max_limit: 50,
        }
    }
}

/// Comparator settings
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// Maximum number of markets per comparison
    pub max_markets: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self { max_markets: 10 }
    }
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub title: String,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            title: "Injective Market Analytics API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub metrics: MetricsConfig,
    pub signal: SignalConfig,
    pub trending: TrendingConfig,
    pub compare: CompareConfig,
}

impl AnalyticsConfig {
    /// Load configuration from environment variables
    ///
    /// Recognized:
    /// - NETWORK: mainnet | testnet
    /// - LCD_ENDPOINT / INDEXER_ENDPOINT: override the network defaults
    /// - API_HOST / API_PORT
    /// - CACHE_TTL_SECONDS / MAX_CACHE_SIZE
    /// - RATE_LIMIT_REQUESTS / RATE_LIMIT_PERIOD (seconds)
    /// - RATE_LIMIT_TRUST_FORWARDED_FOR: true | false
    /// - UPSTREAM_TIMEOUT_SECONDS
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(network) = parse_var::<Network, _>(&lookup, "NETWORK")? {
            config.upstream = UpstreamConfig::for_network(network);
        }
        if let Some(lcd) = lookup("LCD_ENDPOINT").filter(|s| !s.is_empty()) {
            config.upstream.lcd_endpoint = lcd;
        }
        if let Some(indexer) = lookup("INDEXER_ENDPOINT").filter(|s| !s.is_empty()) {
            config.upstream.indexer_endpoint = indexer;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "UPSTREAM_TIMEOUT_SECONDS")? {
            config.upstream.request_timeout = Duration::from_secs(secs);
        }

        if let Some(host) = lookup("API_HOST").filter(|s| !s.is_empty()) {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "API_PORT")? {
            config.server.port = port;
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "CACHE_TTL_SECONDS")? {
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(size) = parse_var(&lookup, "MAX_CACHE_SIZE")? {
            config.cache.max_entries = size;
        }

        if let Some(requests) = parse_var(&lookup, "RATE_LIMIT_REQUESTS")? {
            config.rate_limit.max_requests = requests;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RATE_LIMIT_PERIOD")? {
            config.rate_limit.period = Duration::from_secs(secs);
        }
        if let Some(trust) = parse_var(&lookup, "RATE_LIMIT_TRUST_FORWARDED_FOR")? {
            config.rate_limit.trust_forwarded_for = trust;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl.is_zero() {
            return Err(ConfigError::Invalid("cache TTL must be positive".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache capacity must be positive".into()));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.period.is_zero() {
            return Err(ConfigError::Invalid(
                "rate limit requests and period must be positive".into(),
            ));
        }
        if self.signal.weights.total() <= 0.0 {
            return Err(ConfigError::Invalid("signal weights must sum to a positive value".into()));
        }
        if self.signal.sell_threshold >= self.signal.buy_threshold
            || self.signal.buy_threshold > 100
        {
            return Err(ConfigError::Invalid(format!(
                "signal thresholds out of order: sell {} / buy {}",
                self.signal.sell_threshold, self.signal.buy_threshold
            )));
        }
        if self.trending.volume_weight < 0.0 || self.trending.price_change_weight < 0.0 {
            return Err(ConfigError::Invalid("trending weights must be non-negative".into()));
        }
        if self.metrics.trade_window == 0 || self.metrics.orderbook_depth == 0 {
            return Err(ConfigError::Invalid("metrics windows must be positive".into()));
        }
        if self.compare.max_markets == 0 {
            return Err(ConfigError::Invalid("comparison size must be positive".into()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: name.to_string(),
                error: e.to_string(),
            }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value in {field}: {error}")]
    InvalidValue { field: String, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
