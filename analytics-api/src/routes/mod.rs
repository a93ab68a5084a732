//! API route definitions

mod compare;
mod health;
mod markets;
mod metrics;

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};

use crate::error::ApiError;
use crate::AppState;

/// Create the full router: operational routes plus the rate-limited `/api/v1` tree
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        .merge(health::routes())
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(markets::routes())
        .merge(metrics::routes())
        .merge(compare::routes())
        .layer(middleware::from_fn_with_state(state, rate_limit))
}

/// Client identity for rate limiting
///
/// The peer address, unless forwarded addresses are trusted and present.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let trust = state.analytics.config().rate_limit.trust_forwarded_for;
    let key = client_key(&request, trust);
    if let Err(e) = state.rate_limiter.check(&key) {
        return ApiError(e).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use analytics_core::AnalyticsConfig;
    use analytics_services::testing::{book_around, spot_market, trades_at, StaticDataPort};
    use analytics_services::AnalyticsService;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request as HttpRequest, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(config: AnalyticsConfig) -> Router {
        let port = StaticDataPort::new().with_market(
            spot_market("0xinj"),
            book_around("0xinj", 25.0, 5),
            trades_at(&[24.0, 25.0]),
        );
        let analytics = AnalyticsService::new(Arc::new(port), config);
        router(AppState::new(analytics))
    }

    fn app() -> Router {
        app_with(AnalyticsConfig::default())
    }

    fn get(uri: &str) -> Request {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cache"]["capacity"], 1000);
        assert_eq!(body["rate_limiter"]["max_requests"], 100);
    }

    #[tokio::test]
    async fn test_root_redirects_to_health() {
        let response = app().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/health");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let response = app().oneshot(get("/api/v1/metrics/0xinj")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["market_id"], "0xinj");
        assert_eq!(body["ticker"], "INJ/USDT");
    }

    #[tokio::test]
    async fn test_unknown_market_is_404() {
        let response = app()
            .oneshot(get("/api/v1/markets/0xmissing/summary"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_400() {
        let app = app();

        let response = app
            .clone()
            .oneshot(get("/api/v1/markets?market_type=options"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(get("/api/v1/markets/0xinj/orderbook?depth=500"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/api/v1/compare")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compare_endpoint() {
        let response = app()
            .oneshot(get("/api/v1/compare?market_ids=0xinj"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["best_performer"], "0xinj");
        assert_eq!(body["worst_performer"], "0xinj");
    }

    fn markets_from(peer: [u8; 4], forwarded_for: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder()
            .uri("/api/v1/markets")
            .extension(ConnectInfo(SocketAddr::from((peer, 40000))));
        if let Some(addr) = forwarded_for {
            builder = builder.header("x-forwarded-for", addr);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn limited_config(trust_forwarded_for: bool) -> AnalyticsConfig {
        let mut config = AnalyticsConfig::default();
        config.rate_limit.max_requests = 2;
        config.rate_limit.trust_forwarded_for = trust_forwarded_for;
        config
    }

    #[tokio::test]
    async fn test_rate_limit_per_client() {
        let app = app_with(limited_config(false));

        for _ in 0..2 {
            let response = app.clone().oneshot(markets_from([10, 0, 0, 1], None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let rejected = app.clone().oneshot(markets_from([10, 0, 0, 1], None)).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(rejected.headers().contains_key(header::RETRY_AFTER));

        let other = app.clone().oneshot(markets_from([10, 0, 0, 2], None)).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);

        // Operational routes are not limited
        let health = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_by_default() {
        let app = app_with(limited_config(false));

        let mut admitted = 0;
        for i in 0..10 {
            let forwarded = format!("1.2.3.{}", i);
            let response = app
                .clone()
                .oneshot(markets_from([10, 0, 0, 1], Some(&forwarded)))
                .await
                .unwrap();
            if response.status() == StatusCode::OK {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 2);
    }

    #[tokio::test]
    async fn test_forwarded_for_keys_clients_when_trusted() {
        let app = app_with(limited_config(true));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(markets_from([10, 0, 0, 9], Some("203.0.113.1")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let rejected = app
            .clone()
            .oneshot(markets_from([10, 0, 0, 9], Some("203.0.113.1")))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);

        // Same proxy, different forwarded client
        let other = app
            .oneshot(markets_from([10, 0, 0, 9], Some("203.0.113.2, 10.0.0.9")))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let app = app();
        app.clone().oneshot(get("/api/v1/markets")).await.unwrap();

        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/cache/clear")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["cleared"], 1);
    }
}
