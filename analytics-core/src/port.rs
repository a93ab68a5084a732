//! Raw data port
//!
//! The boundary between the analytics engine and whatever fetches raw market
//! data from the chain. Implementations convert loosely-typed upstream
//! payloads into the typed structures in [`crate::market`] once, at
//! ingestion, and report failures as `UpstreamUnavailable` or `NotFound`.

use async_trait::async_trait;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::market::{MarketDescriptor, MarketKind, OrderBookSnapshot, TradeRecord};

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// List markets, optionally restricted to one kind
    async fn list_markets(&self, kind: Option<MarketKind>) -> AnalyticsResult<Vec<MarketDescriptor>>;

    /// Order book snapshot with at most `depth` levels per side
    async fn get_orderbook(&self, market_id: &str, depth: usize)
        -> AnalyticsResult<OrderBookSnapshot>;

    /// Most recent trades, oldest first
    async fn get_trades(&self, market_id: &str, limit: usize) -> AnalyticsResult<Vec<TradeRecord>>;

    /// Look up a single market descriptor
    async fn get_market(&self, market_id: &str) -> AnalyticsResult<MarketDescriptor> {
        self.list_markets(None)
            .await?
            .into_iter()
            .find(|m| m.market_id == market_id)
            .ok_or_else(|| AnalyticsError::not_found(format!("Market {} not found", market_id)))
    }
}
