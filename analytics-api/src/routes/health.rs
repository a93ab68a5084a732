//! Operational endpoints

use axum::{
    extract::State,
    response::{Json, Redirect},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use analytics_services::{HealthReport, RateLimiterStats};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    #[serde(flatten)]
    report: HealthReport,
    rate_limiter: RateLimiterStats,
}

#[derive(Debug, Serialize)]
struct ClearCacheResponse {
    status: &'static str,
    cleared: usize,
    timestamp: DateTime<Utc>,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        report: state.analytics.health(),
        rate_limiter: state.rate_limiter.stats(),
    })
}

async fn clear_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    let cleared = state.analytics.clear_cache();
    info!("Cache cleared via API ({} entries)", cleared);

    Json(ClearCacheResponse {
        status: "success",
        cleared,
        timestamp: Utc::now(),
    })
}

async fn root() -> Redirect {
    Redirect::temporary("/health")
}

/// Create operational routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/cache/clear", post(clear_cache))
}
