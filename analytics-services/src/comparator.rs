//! Comparator
//!
//! Reduces per-market summaries into best/worst performer and averages.

use chrono::Utc;
use std::cmp::Ordering;

use analytics_core::{AnalyticsError, AnalyticsResult, ComparisonResult, MarketSummary};

/// Compare a non-empty list of market summaries
///
/// Best and worst are picked by price change; among equal changes the
/// higher volume wins, then the lower identifier. A single summary is its
/// own best and worst, and the averages are its own values.
pub fn compare(summaries: Vec<MarketSummary>) -> AnalyticsResult<ComparisonResult> {
    if summaries.is_empty() {
        return Err(AnalyticsError::invalid_input(
            "comparison requires at least one market",
        ));
    }

    let best = summaries
        .iter()
        .min_by(|a, b| {
            b.price_change_24h
                .total_cmp(&a.price_change_24h)
                .then_with(|| tie_break(a, b))
        })
        .map(|s| s.market_id.clone())
        .unwrap_or_default();

    let worst = summaries
        .iter()
        .min_by(|a, b| {
            a.price_change_24h
                .total_cmp(&b.price_change_24h)
                .then_with(|| tie_break(a, b))
        })
        .map(|s| s.market_id.clone())
        .unwrap_or_default();

    let n = summaries.len() as f64;
    let average_volume = summaries.iter().map(|s| s.volume_24h).sum::<f64>() / n;
    let average_price_change = summaries.iter().map(|s| s.price_change_24h).sum::<f64>() / n;

    Ok(ComparisonResult {
        markets: summaries.iter().map(|s| s.market_id.clone()).collect(),
        best_performer: best,
        worst_performer: worst,
        average_volume,
        average_price_change,
        data: summaries,
        timestamp: Utc::now(),
    })
}

/// Higher volume first, then identifier ascending
fn tie_break(a: &MarketSummary, b: &MarketSummary) -> Ordering {
    b.volume_24h
        .total_cmp(&a.volume_24h)
        .then_with(|| a.market_id.cmp(&b.market_id))
}
