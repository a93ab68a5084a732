//! Market comparison endpoint

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use analytics_core::{AnalyticsError, ComparisonResult};

use crate::error::ApiError;
use crate::AppState;

/// Query parameters for comparison
#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    /// Comma-separated market identifiers
    pub market_ids: Option<String>,
}

/// Create comparison routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/compare", get(compare_markets))
}

async fn compare_markets(
    State(state): State<AppState>,
    Query(params): Query<CompareQuery>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let raw = params
        .market_ids
        .ok_or_else(|| AnalyticsError::invalid_input("market_ids is required"))?;
    let ids: Vec<String> = raw.split(',').map(str::to_string).collect();

    Ok(Json(state.analytics.compare(&ids).await?))
}
