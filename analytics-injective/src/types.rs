//! Injective API response types
//!
//! Raw shapes returned by the chain LCD and the exchange indexer, and their
//! conversion into the typed structures of `analytics-core`. Field names are
//! accepted in both the snake_case of the LCD gateway and the camelCase of
//! the indexer.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use analytics_core::{
    MarketDescriptor, MarketKind, OrderBookLevel, OrderBookSnapshot, TradeRecord, TradeSide,
};

// ============================================================================
// Scaling
// ============================================================================

/// Fixed-point scaling of chain integers into display units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub price_decimals: u32,
    pub quantity_decimals: u32,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            price_decimals: 6,
            quantity_decimals: 18,
        }
    }
}

impl Scaling {
    pub fn price(&self, raw: &str) -> Option<f64> {
        scale(raw, self.price_decimals)
    }

    pub fn quantity(&self, raw: &str) -> Option<f64> {
        scale(raw, self.quantity_decimals)
    }
}

/// Parse a decimal string and shift it right by `decimals` digits
///
/// `None` for unparsable input or a shift beyond what `Decimal` can hold.
pub fn scale(raw: &str, decimals: u32) -> Option<f64> {
    let raw = raw.trim();
    let value = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()?;
    if decimals > 28 {
        return None;
    }
    value.checked_mul(Decimal::new(1, decimals))?.to_f64()
}

// ============================================================================
// Market listings (chain LCD)
// ============================================================================

/// Response from `/injective/exchange/v1beta1/{spot|derivative}/markets`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Vec<MarketEntry>,
}

/// Derivative listings wrap each market with its mark price; spot listings
/// may not
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MarketEntry {
    Wrapped { market: ChainMarket },
    Bare(ChainMarket),
}

impl MarketEntry {
    pub fn into_market(self) -> ChainMarket {
        match self {
            MarketEntry::Wrapped { market } | MarketEntry::Bare(market) => market,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainMarket {
    #[serde(alias = "marketId")]
    pub market_id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default, alias = "baseDenom")]
    pub base_denom: Option<String>,
    #[serde(default, alias = "quoteDenom")]
    pub quote_denom: String,
    #[serde(default, alias = "oracleBase")]
    pub oracle_base: Option<String>,
    #[serde(default, alias = "oracleQuote")]
    pub oracle_quote: Option<String>,
    #[serde(default, alias = "oracleType")]
    pub oracle_type: Option<String>,
}

impl ChainMarket {
    pub fn to_descriptor(&self, kind: MarketKind) -> MarketDescriptor {
        let mut descriptor = MarketDescriptor::new(
            self.market_id.clone(),
            self.ticker.clone(),
            // Derivatives have no base denom; they settle in the quote denom
            self.base_denom.clone().unwrap_or_else(|| self.quote_denom.clone()),
            self.quote_denom.clone(),
            kind,
        );
        descriptor.oracle_base = self.oracle_base.clone().filter(|s| !s.is_empty());
        descriptor.oracle_quote = self.oracle_quote.clone().filter(|s| !s.is_empty());
        descriptor.oracle_type = self.oracle_type.clone().filter(|s| !s.is_empty());
        descriptor
    }
}

// ============================================================================
// Order books (chain LCD)
// ============================================================================

/// Response from `/injective/exchange/v1beta1/{spot|derivative}/orderbook/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderbookResponse {
    #[serde(default, alias = "buys_price_level")]
    pub buys: Vec<PriceLevel>,
    #[serde(default, alias = "sells_price_level")]
    pub sells: Vec<PriceLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceLevel {
    #[serde(alias = "price")]
    pub p: String,
    #[serde(alias = "quantity")]
    pub q: String,
}

impl OrderbookResponse {
    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    /// Convert to a validated snapshot
    ///
    /// Levels with a non-positive or unparsable price or quantity are
    /// dropped. Bids come out descending, asks ascending, each side cut to
    /// `depth`.
    pub fn to_snapshot(
        &self,
        market_id: &str,
        kind: MarketKind,
        depth: usize,
        scaling: &Scaling,
    ) -> OrderBookSnapshot {
        let convert = |levels: &[PriceLevel]| -> Vec<OrderBookLevel> {
            levels
                .iter()
                .filter_map(|level| {
                    let price = scaling.price(&level.p)?;
                    let quantity = scaling.quantity(&level.q)?;
                    (price > 0.0 && quantity > 0.0).then(|| OrderBookLevel::new(price, quantity))
                })
                .collect()
        };

        let mut book = OrderBookSnapshot::new(market_id, kind, depth);

        let mut bids = convert(&self.buys);
        bids.sort_by(|a, b| b.price.total_cmp(&a.price)); // Descending: best bid first
        let mut asks = convert(&self.sells);
        asks.sort_by(|a, b| a.price.total_cmp(&b.price)); // Ascending: best ask first

        book.bids = bids;
        book.asks = asks;
        book.truncate(depth);
        book
    }
}

// ============================================================================
// Trades (exchange indexer)
// ============================================================================

/// Response from `/api/exchange/{spot|derivative}/v1/trades`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradesResponse {
    #[serde(default)]
    pub trades: Vec<IndexerTrade>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerTrade {
    /// Spot trades carry price and quantity here
    #[serde(default)]
    pub price: Option<SpotPrice>,
    /// Derivative trades carry them here
    #[serde(default)]
    pub position_delta: Option<PositionDelta>,
    #[serde(default)]
    pub trade_direction: Option<String>,
    #[serde(default)]
    pub execution_side: Option<String>,
    #[serde(default, deserialize_with = "de_millis")]
    pub executed_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotPrice {
    pub price: String,
    pub quantity: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDelta {
    #[serde(default)]
    pub trade_direction: Option<String>,
    pub execution_price: String,
    pub execution_quantity: String,
}

impl IndexerTrade {
    /// Convert to a trade record, or `None` when the trade cannot be priced
    pub fn to_trade(&self, scaling: &Scaling) -> Option<TradeRecord> {
        let (price, quantity, direction) = match (&self.position_delta, &self.price) {
            (Some(delta), _) => (
                scaling.price(&delta.execution_price)?,
                scaling.quantity(&delta.execution_quantity)?,
                delta.trade_direction.as_deref().or(self.trade_direction.as_deref()),
            ),
            (None, Some(spot)) => (
                scaling.price(&spot.price)?,
                scaling.quantity(&spot.quantity)?,
                self.trade_direction.as_deref(),
            ),
            (None, None) => return None,
        };

        if price <= 0.0 || quantity <= 0.0 {
            return None;
        }

        let side = direction
            .or(self.execution_side.as_deref())
            .map(TradeSide::parse)
            .unwrap_or(TradeSide::Unknown);

        Some(TradeRecord {
            price,
            quantity,
            side,
            timestamp: self.executed_at.and_then(timestamp_from_millis)?,
        })
    }
}

/// Convert indexer trades, dropping unusable ones, oldest first
pub fn to_trades(trades: &[IndexerTrade], scaling: &Scaling) -> Vec<TradeRecord> {
    let mut records: Vec<TradeRecord> = trades.iter().filter_map(|t| t.to_trade(scaling)).collect();
    records.sort_by_key(|t| t.timestamp);
    records
}

/// Timestamps may be seconds or milliseconds
fn timestamp_from_millis(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 10_000_000_000 {
        Utc.timestamp_millis_opt(ts).single()
    } else {
        Utc.timestamp_opt(ts, 0).single()
    }
}

/// The indexer sends epoch milliseconds as a number or a string
fn de_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Millis>::deserialize(deserializer)? {
        Some(Millis::Number(n)) => Some(n),
        Some(Millis::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}
