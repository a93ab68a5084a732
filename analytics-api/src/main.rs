//! Injective Market Analytics API Server
//!
//! HTTP API server exposing cached market analytics for Injective markets.

mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use analytics_core::{AnalyticsConfig, MarketDataPort};
use analytics_injective::InjectiveClient;
use analytics_services::{AnalyticsService, RateLimiter};
use axum::http::{header, Method};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub analytics: AnalyticsService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(analytics: AnalyticsService) -> Self {
        let rate_limiter = Arc::new(RateLimiter::from_config(&analytics.config().rate_limit));
        Self {
            analytics,
            rate_limiter,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,analytics_api=debug")),
        )
        .init();

    let config = AnalyticsConfig::from_env()?;
    info!(
        "Starting {} v{} on {}",
        config.server.title, config.server.version, config.upstream.network
    );
    info!(
        "Upstream: lcd={} indexer={}",
        config.upstream.lcd_endpoint, config.upstream.indexer_endpoint
    );

    let client = InjectiveClient::new(&config.upstream)?;
    let port: Arc<dyn MarketDataPort> = Arc::new(client);

    let (host, server_port) = (config.server.host.clone(), config.server.port);
    let analytics = AnalyticsService::new(port, config);
    let state = AppState::new(analytics);

    // Background maintenance
    let sweeper = state.analytics.spawn_cache_sweeper();
    let limiter = Arc::clone(&state.rate_limiter);
    let pruner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.period());
        loop {
            ticker.tick().await;
            let pruned = limiter.prune_idle();
            if pruned > 0 {
                debug!("Pruned {} idle rate limit windows", pruned);
            }
        }
    });

    // Configure CORS for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let listener = tokio::net::TcpListener::bind((host.as_str(), server_port)).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    pruner.abort();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
