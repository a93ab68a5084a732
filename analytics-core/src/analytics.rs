//! Derived analytics values
//!
//! Everything here is computed from raw market data and returned as a new
//! value; nothing holds references into cached state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::market::{MarketKind, MarketSummary};

/// Direction of traded volume between two consecutive windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Directional price trend over the trade window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMomentum {
    Bullish,
    Bearish,
    Neutral,
}

/// Derived market metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub market_id: String,
    pub ticker: String,
    /// Standard deviation of trade-price log-returns
    pub volatility: f64,
    /// (ask - bid) / mid * 100
    pub spread_percentage: f64,
    /// Resting depth near the touch, 0-100
    pub liquidity_score: f64,
    pub volume_trend: VolumeTrend,
    pub price_momentum: PriceMomentum,
    /// Price change over the trade window, in percent
    pub price_change_percent: f64,
    /// Best bid above best ask when the snapshot was taken
    #[serde(default)]
    pub book_crossed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Trading recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        };
        write!(f, "{}", s)
    }
}

/// Trading signal derived purely from [`MarketMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub market_id: String,
    pub ticker: String,
    pub signal: Signal,
    /// Combined strength, 0-100
    pub strength: u8,
    /// Every sub-score that went into `strength`, by name
    pub indicators: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

/// A ranked entry in the trending list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingMarket {
    pub market_id: String,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: MarketKind,
    pub price_change_24h: f64,
    pub volume_24h: f64,
    /// Composite ranking score
    pub score: f64,
    /// 1-based position in the ranking
    pub rank: usize,
}

/// Aggregate statistics over a set of markets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Market identifiers in input order
    pub markets: Vec<String>,
    pub best_performer: String,
    pub worst_performer: String,
    pub average_volume: f64,
    pub average_price_change: f64,
    /// The summaries the comparison was computed from
    pub data: Vec<MarketSummary>,
    pub timestamp: DateTime<Utc>,
}
