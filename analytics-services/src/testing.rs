//! Scripted in-memory market data for tests
//!
//! [`StaticDataPort`] serves fixed markets, books, and trades, counts every
//! upstream call, and can be told to fail or stall per market.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use analytics_core::{
    AnalyticsError, AnalyticsResult, MarketDataPort, MarketDescriptor, MarketKind, OrderBookLevel,
    OrderBookSnapshot, TradeRecord, TradeSide,
};

#[derive(Default)]
pub struct StaticDataPort {
    markets: RwLock<Vec<MarketDescriptor>>,
    books: RwLock<HashMap<String, OrderBookSnapshot>>,
    trades: RwLock<HashMap<String, Vec<TradeRecord>>>,
    failures: RwLock<HashMap<String, AnalyticsError>>,
    listing_failure: RwLock<Option<AnalyticsError>>,
    delay: RwLock<Duration>,
    list_calls: AtomicUsize,
    orderbook_calls: AtomicUsize,
    trade_calls: AtomicUsize,
}

impl StaticDataPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a market with its book and trades
    pub fn with_market(
        self,
        market: MarketDescriptor,
        book: OrderBookSnapshot,
        trades: Vec<TradeRecord>,
    ) -> Self {
        self.insert_market(market, book, trades);
        self
    }

    /// Stall every call by `delay`
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = delay;
        self
    }

    pub fn insert_market(
        &self,
        market: MarketDescriptor,
        book: OrderBookSnapshot,
        trades: Vec<TradeRecord>,
    ) {
        let id = market.market_id.clone();
        self.markets.write().push(market);
        self.books.write().insert(id.clone(), book);
        self.trades.write().insert(id, trades);
    }

    pub fn set_trades(&self, market_id: &str, trades: Vec<TradeRecord>) {
        self.trades.write().insert(market_id.to_string(), trades);
    }

    /// Make book and trade fetches for `market_id` fail with `error`
    pub fn fail_market(&self, market_id: &str, error: AnalyticsError) {
        self.failures.write().insert(market_id.to_string(), error);
    }

    pub fn fail_listing(&self, error: AnalyticsError) {
        *self.listing_failure.write() = Some(error);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn orderbook_calls(&self) -> usize {
        self.orderbook_calls.load(Ordering::SeqCst)
    }

    pub fn trade_calls(&self) -> usize {
        self.trade_calls.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        let delay = *self.delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, market_id: &str) -> AnalyticsResult<()> {
        if let Some(error) = self.failures.read().get(market_id) {
            return Err(error.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataPort for StaticDataPort {
    async fn list_markets(&self, kind: Option<MarketKind>) -> AnalyticsResult<Vec<MarketDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;

        if let Some(error) = self.listing_failure.read().clone() {
            return Err(error);
        }

        Ok(self
            .markets
            .read()
            .iter()
            .filter(|m| kind.map_or(true, |k| m.kind == k))
            .cloned()
            .collect())
    }

    async fn get_orderbook(
        &self,
        market_id: &str,
        depth: usize,
    ) -> AnalyticsResult<OrderBookSnapshot> {
        self.orderbook_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        self.check(market_id)?;

        let mut book = self
            .books
            .read()
            .get(market_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::not_found(format!("Market {} not found", market_id)))?;
        book.truncate(depth);
        Ok(book)
    }

    async fn get_trades(&self, market_id: &str, limit: usize) -> AnalyticsResult<Vec<TradeRecord>> {
        self.trade_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        self.check(market_id)?;

        let trades = self.trades.read();
        let all = trades
            .get(market_id)
            .ok_or_else(|| AnalyticsError::not_found(format!("Market {} not found", market_id)))?;
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }
}

/// Spot market descriptor with a derived ticker
pub fn spot_market(market_id: &str) -> MarketDescriptor {
    MarketDescriptor::new(
        market_id,
        format!("{}/USDT", market_id.trim_start_matches("0x").to_uppercase()),
        market_id,
        "usdt",
        MarketKind::Spot,
    )
}

/// Two-sided book around `mid` with `levels` levels per side, one unit each
pub fn book_around(market_id: &str, mid: f64, levels: usize) -> OrderBookSnapshot {
    let mut book = OrderBookSnapshot::new(market_id, MarketKind::Spot, levels);
    let tick = mid * 0.001;
    book.bids = (1..=levels)
        .map(|i| OrderBookLevel::new(mid - tick * i as f64, 100.0))
        .collect();
    book.asks = (1..=levels)
        .map(|i| OrderBookLevel::new(mid + tick * i as f64, 100.0))
        .collect();
    book
}

/// Trades at the given prices, one unit each, a minute apart, oldest first,
/// the last one a minute ago
pub fn trades_at(prices: &[f64]) -> Vec<TradeRecord> {
    let now = Utc::now();
    let n = prices.len() as i64;
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| TradeRecord {
            price,
            quantity: 1.0,
            side: if i % 2 == 0 { TradeSide::Buy } else { TradeSide::Sell },
            timestamp: now - ChronoDuration::minutes(n - i as i64),
        })
        .collect()
}
