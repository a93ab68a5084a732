//! Market data endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use analytics_core::{
    AnalyticsError, MarketDescriptor, MarketKind, MarketSummary, OrderBookSnapshot, TradeRecord,
};
use analytics_services::{DEFAULT_ORDERBOOK_DEPTH, DEFAULT_TRADE_LIMIT};

use crate::error::ApiError;
use crate::AppState;

/// Query parameters for listing markets
#[derive(Debug, Deserialize)]
pub struct ListMarketsQuery {
    /// Filter by market type (spot, derivative, or all)
    pub market_type: Option<String>,
}

/// Response for listing markets
#[derive(Debug, Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<MarketDescriptor>,
    pub count: usize,
}

/// Query parameters for order book
#[derive(Debug, Deserialize)]
pub struct OrderBookQuery {
    /// Levels per side
    pub depth: Option<usize>,
}

/// Query parameters for trades
#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    /// Maximum number of trades
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub market_id: String,
    pub trades: Vec<TradeRecord>,
    pub count: usize,
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/markets", get(list_markets))
        .route("/markets/{id}/summary", get(get_summary))
        .route("/markets/{id}/orderbook", get(get_orderbook))
        .route("/markets/{id}/trades", get(get_trades))
}

fn parse_market_type(raw: Option<&str>) -> Result<Option<MarketKind>, AnalyticsError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse::<MarketKind>()
            .map(Some)
            .map_err(AnalyticsError::invalid_input),
    }
}

async fn list_markets(
    State(state): State<AppState>,
    Query(params): Query<ListMarketsQuery>,
) -> Result<Json<MarketsResponse>, ApiError> {
    let kind = parse_market_type(params.market_type.as_deref())?;
    let markets = state.analytics.list_markets(kind).await?;
    let count = markets.len();
    debug!("Returning {} markets", count);

    Ok(Json(MarketsResponse { markets, count }))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MarketSummary>, ApiError> {
    Ok(Json(state.analytics.market_summary(&id).await?))
}

async fn get_orderbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<OrderBookQuery>,
) -> Result<Json<OrderBookSnapshot>, ApiError> {
    let depth = params.depth.unwrap_or(DEFAULT_ORDERBOOK_DEPTH);
    Ok(Json(state.analytics.orderbook(&id, depth).await?))
}

async fn get_trades(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TradesQuery>,
) -> Result<Json<TradesResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_TRADE_LIMIT);
    let trades = state.analytics.trades(&id, limit).await?;
    let count = trades.len();

    Ok(Json(TradesResponse {
        market_id: id,
        trades,
        count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_market_type() {
        assert_eq!(parse_market_type(None).unwrap(), None);
        assert_eq!(parse_market_type(Some("all")).unwrap(), None);
        assert_eq!(parse_market_type(Some("spot")).unwrap(), Some(MarketKind::Spot));
        assert_eq!(
            parse_market_type(Some("derivative")).unwrap(),
            Some(MarketKind::Derivative)
        );
        assert!(matches!(
            parse_market_type(Some("options")),
            Err(AnalyticsError::InvalidInput(_))
        ));
    }
}
