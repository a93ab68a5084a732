//! Derived analytics endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use analytics_core::{MarketMetrics, TradingSignal, TrendingMarket};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub markets: Vec<TrendingMarket>,
    pub count: usize,
}

/// Create metrics routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics/trending/markets", get(get_trending))
        .route("/metrics/{id}", get(get_metrics))
        .route("/metrics/{id}/signals", get(get_signal))
}

async fn get_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MarketMetrics>, ApiError> {
    Ok(Json(state.analytics.metrics(&id).await?))
}

async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TradingSignal>, ApiError> {
    Ok(Json(state.analytics.signal(&id).await?))
}

async fn get_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingQuery>,
) -> Result<Json<TrendingResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(state.analytics.config().trending.default_limit);
    let markets = state.analytics.trending(limit).await?;
    let count = markets.len();

    Ok(Json(TrendingResponse { markets, count }))
}
