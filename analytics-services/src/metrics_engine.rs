//! Metrics Engine
//!
//! Computes derived statistics from an order book snapshot and a trade
//! window. Pure and synchronous: no I/O, no shared state.

use chrono::Utc;
use tracing::debug;

use analytics_core::{
    AnalyticsError, AnalyticsResult, MarketDescriptor, MarketMetrics, MarketSummary, MetricsConfig,
    OrderBookSnapshot, PriceMomentum, TradeRecord, VolumeTrend,
};

/// Calculator for per-market metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: MetricsConfig,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Compute the full metric set for a market
    ///
    /// Fails with `InsufficientData` when the book is one-sided.
    pub fn compute(
        &self,
        market: &MarketDescriptor,
        book: &OrderBookSnapshot,
        trades: &[TradeRecord],
    ) -> AnalyticsResult<MarketMetrics> {
        let spread_percentage = self.spread_percentage(book)?;
        let price_change_percent = price_change_percent(trades);

        let metrics = MarketMetrics {
            market_id: market.market_id.clone(),
            ticker: market.ticker.clone(),
            volatility: self.volatility(trades),
            spread_percentage,
            liquidity_score: self.liquidity_score(book),
            volume_trend: self.volume_trend(trades),
            price_momentum: self.price_momentum(price_change_percent),
            price_change_percent,
            book_crossed: book.is_crossed(),
            timestamp: Utc::now(),
        };

        debug!(
            "Computed metrics for {}: vol={:.6} spread={:.4}% liq={:.2}",
            market.market_id, metrics.volatility, metrics.spread_percentage, metrics.liquidity_score
        );
        Ok(metrics)
    }

    /// Standard deviation of consecutive log-returns
    ///
    /// Non-positive prices are ignored. Zero with fewer than two usable
    /// prices.
    pub fn volatility(&self, trades: &[TradeRecord]) -> f64 {
        let prices: Vec<f64> = trades
            .iter()
            .map(|t| t.price)
            .filter(|p| is_usable_price(*p))
            .collect();

        if prices.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

        variance.sqrt()
    }

    /// (best ask - best bid) / midpoint * 100
    ///
    /// A crossed book reports zero; use [`OrderBookSnapshot::is_crossed`]
    /// to tell it apart from a locked one.
    pub fn spread_percentage(&self, book: &OrderBookSnapshot) -> AnalyticsResult<f64> {
        let (bid, ask) = match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => (bid, ask),
            (None, _) => {
                return Err(AnalyticsError::insufficient_data(format!(
                    "order book for {} has no bids",
                    book.market_id
                )))
            }
            (_, None) => {
                return Err(AnalyticsError::insufficient_data(format!(
                    "order book for {} has no asks",
                    book.market_id
                )))
            }
        };

        let mid = (bid + ask) / 2.0;
        if mid <= 0.0 {
            return Err(AnalyticsError::insufficient_data(format!(
                "order book for {} has a non-positive midpoint",
                book.market_id
            )));
        }

        Ok(((ask - bid) / mid * 100.0).max(0.0))
    }

    /// Resting quantity within the band around the midpoint, scaled to 0-100
    pub fn liquidity_score(&self, book: &OrderBookSnapshot) -> f64 {
        let Some(mid) = book.mid_price() else {
            return 0.0;
        };
        if mid <= 0.0 {
            return 0.0;
        }

        let band = mid * self.config.liquidity_band_pct / 100.0;
        let (low, high) = (mid - band, mid + band);

        let resting: f64 = book
            .bids
            .iter()
            .chain(book.asks.iter())
            .filter(|level| level.price >= low && level.price <= high)
            .map(|level| level.quantity.max(0.0))
            .sum();

        (resting / self.config.liquidity_divisor).min(100.0)
    }

    /// Compare volume of the recent half of the window against the prior half
    ///
    /// Both halves hold the same number of trades; with an odd count the
    /// middle trade belongs to neither.
    pub fn volume_trend(&self, trades: &[TradeRecord]) -> VolumeTrend {
        if trades.len() < 2 {
            return VolumeTrend::Stable;
        }

        let half = trades.len() / 2;
        let (prior, recent) = (&trades[..half], &trades[trades.len() - half..]);
        let prior_volume: f64 = prior.iter().map(|t| t.quantity).sum();
        let recent_volume: f64 = recent.iter().map(|t| t.quantity).sum();

        if prior_volume <= 0.0 {
            return if recent_volume > 0.0 {
                VolumeTrend::Increasing
            } else {
                VolumeTrend::Stable
            };
        }

        let ratio = recent_volume / prior_volume;
        if ratio > self.config.volume_increase_ratio {
            VolumeTrend::Increasing
        } else if ratio < self.config.volume_decrease_ratio {
            VolumeTrend::Decreasing
        } else {
            VolumeTrend::Stable
        }
    }

    /// Classify a price change against the noise threshold
    pub fn price_momentum(&self, change_percent: f64) -> PriceMomentum {
        let threshold = self.config.momentum_threshold_pct;
        if change_percent > threshold {
            PriceMomentum::Bullish
        } else if change_percent < -threshold {
            PriceMomentum::Bearish
        } else {
            PriceMomentum::Neutral
        }
    }

    /// Price, volume, and change over the summary window
    pub fn summarize(
        &self,
        market: &MarketDescriptor,
        book: &OrderBookSnapshot,
        trades: &[TradeRecord],
    ) -> AnalyticsResult<MarketSummary> {
        let last_price = trades
            .last()
            .map(|t| t.price)
            .or_else(|| book.mid_price())
            .ok_or_else(|| {
                AnalyticsError::insufficient_data(format!(
                    "market {} has no trades and no two-sided book",
                    market.market_id
                ))
            })?;

        let now = Utc::now();
        let cutoff = now - self.config.summary_window;
        let window: Vec<TradeRecord> = trades
            .iter()
            .filter(|t| t.timestamp >= cutoff)
            .cloned()
            .collect();

        Ok(MarketSummary {
            market_id: market.market_id.clone(),
            ticker: market.ticker.clone(),
            kind: market.kind,
            last_price,
            volume_24h: window.iter().map(TradeRecord::notional).sum(),
            price_change_24h: price_change_percent(&window),
            timestamp: now,
        })
    }
}

/// Prices usable for returns and changes: positive and finite
fn is_usable_price(price: f64) -> bool {
    price > 0.0 && price.is_finite()
}

/// Percentage change from the first to the last usable trade price
fn price_change_percent(trades: &[TradeRecord]) -> f64 {
    let mut prices = trades.iter().map(|t| t.price).filter(|p| is_usable_price(*p));
    match (prices.next(), prices.last()) {
        (Some(first), Some(last)) => (last - first) / first * 100.0,
        _ => 0.0,
    }
}
