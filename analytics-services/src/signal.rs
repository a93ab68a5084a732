//! Signal Generator
//!
//! Maps [`MarketMetrics`] to a buy/sell/hold recommendation. Each indicator
//! is scored on a 0-100 scale, the scores are combined with configurable
//! weights, and every sub-score is returned by name alongside the result.

use chrono::Utc;
use std::collections::BTreeMap;

use analytics_core::{
    MarketMetrics, PriceMomentum, Signal, SignalConfig, TradingSignal, VolumeTrend,
};

pub const MOMENTUM: &str = "momentum";
pub const VOLATILITY: &str = "volatility";
pub const LIQUIDITY: &str = "liquidity";
pub const SPREAD: &str = "spread";
pub const VOLUME_TREND: &str = "volume_trend";

/// Pure function from metrics to a trading signal
#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    config: SignalConfig,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// Produce a signal for a set of metrics
    pub fn generate(&self, metrics: &MarketMetrics) -> TradingSignal {
        let indicators = self.indicators(metrics);
        let strength = self.strength(&indicators);
        let signal = self.classify(strength, metrics.price_momentum);

        TradingSignal {
            market_id: metrics.market_id.clone(),
            ticker: metrics.ticker.clone(),
            signal,
            strength,
            indicators,
            timestamp: Utc::now(),
        }
    }

    /// Every sub-score, each clamped to 0-100
    pub fn indicators(&self, metrics: &MarketMetrics) -> BTreeMap<String, f64> {
        let momentum =
            50.0 + metrics.price_change_percent * self.config.momentum_sensitivity;

        let volatility = if self.config.volatility_reference > 0.0 {
            100.0 / (1.0 + metrics.volatility / self.config.volatility_reference)
        } else {
            0.0
        };

        let spread = 100.0 - metrics.spread_percentage * self.config.spread_penalty;

        let volume_trend = match metrics.volume_trend {
            VolumeTrend::Increasing => 75.0,
            VolumeTrend::Stable => 50.0,
            VolumeTrend::Decreasing => 25.0,
        };

        [
            (MOMENTUM, momentum),
            (VOLATILITY, volatility),
            (LIQUIDITY, metrics.liquidity_score),
            (SPREAD, spread),
            (VOLUME_TREND, volume_trend),
        ]
        .into_iter()
        .map(|(name, score)| (name.to_string(), clamp_score(score)))
        .collect()
    }

    /// Weighted mean of the sub-scores, rounded and clamped to 0-100
    pub fn strength(&self, indicators: &BTreeMap<String, f64>) -> u8 {
        let weights = &self.config.weights;
        let total = weights.total();
        if total <= 0.0 {
            return 0;
        }

        let score = |name: &str| indicators.get(name).copied().unwrap_or(0.0);
        let weighted = weights.momentum * score(MOMENTUM)
            + weights.volatility * score(VOLATILITY)
            + weights.liquidity * score(LIQUIDITY)
            + weights.spread * score(SPREAD)
            + weights.volume_trend * score(VOLUME_TREND);

        clamp_score(weighted / total).round() as u8
    }

    /// Category from strength, with momentum direction as a veto
    ///
    /// Bearish momentum never yields buy and bullish momentum never yields
    /// sell; both degrade to hold.
    pub fn classify(&self, strength: u8, momentum: PriceMomentum) -> Signal {
        if strength >= self.config.buy_threshold {
            match momentum {
                PriceMomentum::Bearish => Signal::Hold,
                _ => Signal::Buy,
            }
        } else if strength <= self.config.sell_threshold {
            match momentum {
                PriceMomentum::Bullish => Signal::Hold,
                _ => Signal::Sell,
            }
        } else {
            Signal::Hold
        }
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::SignalWeights;

    fn metrics(
        change: f64,
        volatility: f64,
        liquidity: f64,
        spread: f64,
        trend: VolumeTrend,
        momentum: PriceMomentum,
    ) -> MarketMetrics {
        MarketMetrics {
            market_id: "0xinj".to_string(),
            ticker: "INJ/USDT".to_string(),
            volatility,
            spread_percentage: spread,
            liquidity_score: liquidity,
            volume_trend: trend,
            price_momentum: momentum,
            price_change_percent: change,
            book_crossed: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_strong_market_is_buy() {
        let generator = SignalGenerator::default();
        let m = metrics(12.0, 0.0, 100.0, 0.0, VolumeTrend::Increasing, PriceMomentum::Bullish);
        let signal = generator.generate(&m);
        assert_eq!(signal.signal, Signal::Buy);
        assert!(signal.strength >= 66);
    }

    #[test]
    fn test_weak_market_is_sell() {
        let generator = SignalGenerator::default();
        let m = metrics(-12.0, 1.0, 0.0, 5.0, VolumeTrend::Decreasing, PriceMomentum::Bearish);
        let signal = generator.generate(&m);
        assert_eq!(signal.signal, Signal::Sell);
        assert!(signal.strength <= 33);
    }

    #[test]
    fn test_bearish_momentum_never_buys() {
        // Momentum carries no weight, every other indicator is maxed out
        let generator = SignalGenerator::new(SignalConfig {
            weights: SignalWeights {
                momentum: 0.0,
                volatility: 1.0,
                liquidity: 1.0,
                spread: 1.0,
                volume_trend: 0.0,
            },
            ..SignalConfig::default()
        });
        let m = metrics(-20.0, 0.0, 100.0, 0.0, VolumeTrend::Increasing, PriceMomentum::Bearish);
        let signal = generator.generate(&m);
        assert_eq!(signal.strength, 100);
        assert_eq!(signal.signal, Signal::Hold);
    }

    #[test]
    fn test_bullish_momentum_never_sells() {
        let generator = SignalGenerator::default();
        assert_eq!(generator.classify(10, PriceMomentum::Bullish), Signal::Hold);
        assert_eq!(generator.classify(10, PriceMomentum::Neutral), Signal::Sell);
    }

    #[test]
    fn test_strength_is_clamped() {
        let generator = SignalGenerator::default();
        let extreme = metrics(1e9, -5.0, 1e9, -1e9, VolumeTrend::Increasing, PriceMomentum::Bullish);
        let signal = generator.generate(&extreme);
        assert!(signal.strength <= 100);
        assert!(signal.indicators.values().all(|v| (0.0..=100.0).contains(v)));

        let nan = metrics(f64::NAN, f64::NAN, f64::NAN, f64::NAN, VolumeTrend::Stable, PriceMomentum::Neutral);
        assert!(generator.generate(&nan).strength <= 100);
    }

    #[test]
    fn test_indicators_are_named() {
        let generator = SignalGenerator::default();
        let m = metrics(0.0, 0.02, 40.0, 1.0, VolumeTrend::Stable, PriceMomentum::Neutral);
        let indicators = generator.indicators(&m);

        assert_eq!(indicators.len(), 5);
        assert_eq!(indicators[MOMENTUM], 50.0);
        assert_eq!(indicators[VOLATILITY], 50.0);
        assert_eq!(indicators[LIQUIDITY], 40.0);
        assert_eq!(indicators[SPREAD], 80.0);
        assert_eq!(indicators[VOLUME_TREND], 50.0);
    }

    #[test]
    fn test_neutral_market_holds() {
        let generator = SignalGenerator::default();
        let m = metrics(0.0, 0.02, 40.0, 1.0, VolumeTrend::Stable, PriceMomentum::Neutral);
        let signal = generator.generate(&m);
        // 0.35*50 + 0.2*50 + 0.2*40 + 0.1*80 + 0.15*50 = 51
        assert_eq!(signal.strength, 51);
        assert_eq!(signal.signal, Signal::Hold);
    }
}
