//! Trending Ranker
//!
//! Orders markets by a composite of traded volume and absolute price
//! change, each normalized by the largest value in the candidate set.

use analytics_core::{MarketSummary, TrendingConfig, TrendingMarket};

/// Ranks market summaries by activity
#[derive(Debug, Clone, Default)]
pub struct TrendingRanker {
    config: TrendingConfig,
}

impl TrendingRanker {
    pub fn new(config: TrendingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendingConfig {
        &self.config
    }

    /// Rank summaries, most significant first, at most `limit` entries
    ///
    /// Equal scores are ordered by market identifier ascending, so the
    /// output depends only on the input.
    pub fn rank(&self, summaries: &[MarketSummary], limit: usize) -> Vec<TrendingMarket> {
        let candidates: Vec<&MarketSummary> = summaries
            .iter()
            .filter(|s| !self.config.skip_inactive || s.volume_24h > 0.0)
            .collect();

        let max_volume = candidates
            .iter()
            .map(|s| s.volume_24h.max(0.0))
            .fold(0.0, f64::max);
        let max_change = candidates
            .iter()
            .map(|s| s.price_change_24h.abs())
            .fold(0.0, f64::max);

        let mut scored: Vec<(f64, &MarketSummary)> = candidates
            .into_iter()
            .map(|s| {
                let score = self.config.volume_weight * normalize(s.volume_24h.max(0.0), max_volume)
                    + self.config.price_change_weight
                        * normalize(s.price_change_24h.abs(), max_change);
                (score, s)
            })
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| a.market_id.cmp(&b.market_id))
        });

        scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (score, s))| TrendingMarket {
                market_id: s.market_id.clone(),
                ticker: s.ticker.clone(),
                kind: s.kind,
                price_change_24h: s.price_change_24h,
                volume_24h: s.volume_24h,
                score,
                rank: i + 1,
            })
            .collect()
    }
}

fn normalize(value: f64, max: f64) -> f64 {
    if max > 0.0 && value.is_finite() {
        value / max
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::MarketKind;
    use chrono::Utc;

    fn summary(id: &str, change: f64, volume: f64) -> MarketSummary {
        MarketSummary {
            market_id: id.to_string(),
            ticker: id.to_uppercase(),
            kind: MarketKind::Spot,
            last_price: 1.0,
            volume_24h: volume,
            price_change_24h: change,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_ranks_start_at_one_and_increase() {
        let ranker = TrendingRanker::default();
        let ranked = ranker.rank(
            &[summary("a", 1.0, 100.0), summary("b", 5.0, 500.0), summary("c", -2.0, 50.0)],
            10,
        );

        let ranks: Vec<usize> = ranked.iter().map(|m| m.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(ranked[0].market_id, "b");
    }

    #[test]
    fn test_output_truncated_to_limit() {
        let ranker = TrendingRanker::default();
        let input: Vec<_> = (0..20).map(|i| summary(&format!("m{:02}", i), i as f64, 10.0 + i as f64)).collect();
        let ranked = ranker.rank(&input, 5);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked.last().unwrap().rank, 5);
        assert!(ranker.rank(&input, 0).is_empty());
    }

    #[test]
    fn test_ties_broken_by_identifier() {
        let ranker = TrendingRanker::default();
        let ranked = ranker.rank(
            &[summary("zeta", 3.0, 100.0), summary("alpha", 3.0, 100.0), summary("mid", -3.0, 100.0)],
            10,
        );
        let ids: Vec<&str> = ranked.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_large_move_outranks_small_volume_gap() {
        let ranker = TrendingRanker::default();
        // b: 0.6*0.9 + 0.4*1.0 = 0.94 ; a: 0.6*1.0 + 0.4*0.1 = 0.64
        let ranked = ranker.rank(&[summary("a", 1.0, 100.0), summary("b", -10.0, 90.0)], 10);
        assert_eq!(ranked[0].market_id, "b");
        assert!((ranked[0].score - 0.94).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_markets_skipped() {
        let ranker = TrendingRanker::default();
        let ranked = ranker.rank(&[summary("idle", 50.0, 0.0), summary("live", 1.0, 1.0)], 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].market_id, "live");

        let keep_all = TrendingRanker::new(TrendingConfig {
            skip_inactive: false,
            ..TrendingConfig::default()
        });
        assert_eq!(keep_all.rank(&[summary("idle", 50.0, 0.0)], 10).len(), 1);
    }

    #[test]
    fn test_ranking_is_restartable() {
        let ranker = TrendingRanker::default();
        let input = vec![summary("a", 1.0, 10.0), summary("b", 2.0, 20.0)];
        assert_eq!(ranker.rank(&input, 10), ranker.rank(&input, 10));
    }
}
