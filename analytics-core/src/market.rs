//! Market data structures as delivered by the raw data source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of market listed on the exchange module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    /// Spot market (base/quote exchange)
    Spot,
    /// Derivative market (perpetuals and futures)
    Derivative,
}

impl MarketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Spot => "spot",
            MarketKind::Derivative => "derivative",
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MarketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(MarketKind::Spot),
            "derivative" | "derivatives" | "perp" => Ok(MarketKind::Derivative),
            _ => Err(format!("Unknown market type: {}", s)),
        }
    }
}

/// A listed market
///
/// Immutable once listed. The service only caches descriptors, it never
/// changes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    /// Chain-assigned market identifier
    pub market_id: String,

    /// Human-readable ticker (e.g., "INJ/USDT")
    pub ticker: String,

    /// Base denomination
    pub base_denom: String,

    /// Quote denomination
    pub quote_denom: String,

    /// Spot or derivative
    #[serde(rename = "type")]
    pub kind: MarketKind,

    /// Oracle base symbol (derivatives only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_base: Option<String>,

    /// Oracle quote symbol (derivatives only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_quote: Option<String>,

    /// Oracle type (derivatives only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_type: Option<String>,
}

impl MarketDescriptor {
    /// Create a descriptor without oracle information
    pub fn new(
        market_id: impl Into<String>,
        ticker: impl Into<String>,
        base_denom: impl Into<String>,
        quote_denom: impl Into<String>,
        kind: MarketKind,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            ticker: ticker.into(),
            base_denom: base_denom.into(),
            quote_denom: quote_denom.into(),
            kind,
            oracle_base: None,
            oracle_quote: None,
            oracle_type: None,
        }
    }
}

// ============================================================================
// Order Book Types
// ============================================================================

/// A single price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// Price in quote units
    pub price: f64,
    /// Total quantity resting at this level
    pub quantity: f64,
}

impl OrderBookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Order book snapshot for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Market identifier
    pub market_id: String,
    /// Spot or derivative
    #[serde(rename = "type")]
    pub kind: MarketKind,
    /// Bids sorted by price descending (best bid first)
    pub bids: Vec<OrderBookLevel>,
    /// Asks sorted by price ascending (best ask first)
    pub asks: Vec<OrderBookLevel>,
    /// Maximum number of levels requested per side
    pub depth: usize,
    /// Capture time of the snapshot
    pub timestamp: DateTime<Utc>,
}

impl OrderBookSnapshot {
    /// Create an empty snapshot
    pub fn new(market_id: impl Into<String>, kind: MarketKind, depth: usize) -> Self {
        Self {
            market_id: market_id.into(),
            kind,
            bids: Vec::new(),
            asks: Vec::new(),
            depth,
            timestamp: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Average of best bid and best ask
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Best ask minus best bid
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// A crossed book has its best bid above its best ask
    ///
    /// Valid but unusual; analytics flag it rather than fail.
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid > ask)
    }

    /// Keep at most `depth` levels per side
    pub fn truncate(&mut self, depth: usize) {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
        self.depth = depth;
    }
}

// ============================================================================
// Trade Types
// ============================================================================

/// Side of a trade from the taker's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
    Unknown,
}

impl TradeSide {
    /// Parse the chain's execution side / trade direction strings
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "buy" | "long" => TradeSide::Buy,
            "sell" | "short" => TradeSide::Sell,
            _ => TradeSide::Unknown,
        }
    }
}

/// A single executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Execution price
    pub price: f64,
    /// Executed quantity
    pub quantity: f64,
    /// Taker side
    pub side: TradeSide,
    /// Execution time
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    /// Notional value of the trade (price * quantity)
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

// ============================================================================
// Summary Types
// ============================================================================

/// Market summary with price, volume, and change over the summary window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: String,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: MarketKind,
    /// Last traded price (book midpoint if nothing traded)
    pub last_price: f64,
    /// Traded notional over the summary window
    pub volume_24h: f64,
    /// Percentage price change over the summary window
    pub price_change_24h: f64,
    pub timestamp: DateTime<Utc>,
}
