//! End-to-end tests for AnalyticsService against the scripted data port
//!
//! Run with: cargo test -p analytics-services --test service

use std::sync::Arc;
use std::time::Duration;

use analytics_core::{
    AnalyticsConfig, AnalyticsError, MarketKind, MarketDescriptor, PriceMomentum, Signal,
};
use analytics_services::testing::{book_around, spot_market, trades_at, StaticDataPort};
use analytics_services::AnalyticsService;

fn build(port: StaticDataPort, config: AnalyticsConfig) -> (AnalyticsService, Arc<StaticDataPort>) {
    let port = Arc::new(port);
    (AnalyticsService::new(port.clone(), config), port)
}

fn inj_port() -> StaticDataPort {
    StaticDataPort::new().with_market(
        spot_market("0xinj"),
        book_around("0xinj", 25.0, 5),
        trades_at(&[24.0, 24.5, 25.0, 25.0]),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_metrics_requests_share_one_upstream_fetch() {
    let (service, port) = build(
        inj_port().with_delay(Duration::from_millis(50)),
        AnalyticsConfig::default(),
    );

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move { service.metrics("0xinj").await }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(port.list_calls(), 1);
    assert_eq!(port.orderbook_calls(), 1);
    assert_eq!(port.trade_calls(), 1);
    assert_eq!(service.health().in_flight, 0);
}

#[tokio::test]
async fn metrics_reflect_book_and_trades() {
    let (service, _) = build(inj_port(), AnalyticsConfig::default());

    let metrics = service.metrics("0xinj").await.unwrap();

    assert_eq!(metrics.ticker, "INJ/USDT");
    assert!((metrics.spread_percentage - 0.2).abs() < 1e-9);
    assert!((metrics.liquidity_score - 1.0).abs() < 1e-9);
    assert!(metrics.volatility > 0.0);
    assert!((metrics.price_change_percent - (25.0 - 24.0) / 24.0 * 100.0).abs() < 1e-9);
    assert_eq!(metrics.price_momentum, PriceMomentum::Neutral);
    assert!(!metrics.book_crossed);
}

#[tokio::test]
async fn signal_follows_strong_momentum() {
    let port = StaticDataPort::new().with_market(
        spot_market("0xpump"),
        book_around("0xpump", 12.0, 5),
        trades_at(&[10.0, 12.0]),
    );
    let (service, _) = build(port, AnalyticsConfig::default());

    let signal = service.signal("0xpump").await.unwrap();

    assert_ne!(signal.signal, Signal::Sell);
    assert_eq!(signal.indicators.len(), 5);
    assert!(signal.strength <= 100);
}

#[tokio::test]
async fn one_sided_book_is_insufficient_data() {
    let mut book = book_around("0xthin", 5.0, 3);
    book.asks.clear();
    let port = StaticDataPort::new().with_market(spot_market("0xthin"), book, trades_at(&[5.0]));
    let (service, _) = build(port, AnalyticsConfig::default());

    assert!(matches!(
        service.metrics("0xthin").await,
        Err(AnalyticsError::InsufficientData(_))
    ));
    assert!(matches!(
        service.signal("0xthin").await,
        Err(AnalyticsError::InsufficientData(_))
    ));
}

#[tokio::test]
async fn upstream_failure_is_surfaced_not_defaulted() {
    let port = inj_port();
    port.fail_market("0xinj", AnalyticsError::upstream("lcd unreachable"));
    let (service, _) = build(port, AnalyticsConfig::default());

    let result = service.signal("0xinj").await;
    assert!(matches!(result, Err(AnalyticsError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let mut config = AnalyticsConfig::default();
    config.upstream.request_timeout = Duration::from_millis(30);
    let (service, _) = build(inj_port().with_delay(Duration::from_millis(300)), config);

    let result = service.metrics("0xinj").await;
    assert!(matches!(result, Err(AnalyticsError::UpstreamTimeout(_))));
    assert!(result.unwrap_err().is_upstream_failure());
}

#[tokio::test]
async fn unknown_market_is_not_found() {
    let (service, _) = build(inj_port(), AnalyticsConfig::default());

    assert!(matches!(
        service.market("0xmissing").await,
        Err(AnalyticsError::NotFound(_))
    ));
    assert!(matches!(
        service.metrics("0xmissing").await,
        Err(AnalyticsError::NotFound(_))
    ));
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let mut config = AnalyticsConfig::default();
    config.cache.ttl = Duration::from_millis(50);
    let (service, port) = build(inj_port(), config);

    service.trades("0xinj", 10).await.unwrap();
    service.trades("0xinj", 10).await.unwrap();
    assert_eq!(port.trade_calls(), 1);

    tokio::time::sleep(Duration::from_millis(70)).await;

    service.trades("0xinj", 10).await.unwrap();
    assert_eq!(port.trade_calls(), 2);
}

#[tokio::test]
async fn derived_entries_expire_with_their_inputs() {
    let mut config = AnalyticsConfig::default();
    config.cache.ttl = Duration::from_millis(300);
    let (service, port) = build(inj_port(), config);

    // Order book and trades cached now
    service.market_summary("0xinj").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Built from entries with about half their TTL left
    service.metrics("0xinj").await.unwrap();
    assert_eq!(port.trade_calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Inputs have expired, so the metrics entry has too
    service.metrics("0xinj").await.unwrap();
    assert_eq!(port.trade_calls(), 2);
}

#[tokio::test]
async fn empty_trade_history_is_valid() {
    let port = StaticDataPort::new().with_market(
        spot_market("0xnew"),
        book_around("0xnew", 1.0, 2),
        vec![],
    );
    let (service, _) = build(port, AnalyticsConfig::default());

    assert!(service.trades("0xnew", 50).await.unwrap().is_empty());

    let summary = service.market_summary("0xnew").await.unwrap();
    assert!((summary.last_price - 1.0).abs() < 1e-9);
    assert_eq!(summary.volume_24h, 0.0);
}

#[tokio::test]
async fn list_markets_filters_by_kind() {
    let perp = MarketDescriptor::new("0xperp", "INJ/USDT PERP", "inj", "usdt", MarketKind::Derivative);
    let port = inj_port().with_market(perp, book_around("0xperp", 25.0, 5), trades_at(&[25.0]));
    let (service, port) = build(port, AnalyticsConfig::default());

    assert_eq!(service.list_markets(None).await.unwrap().len(), 2);
    let derivatives = service.list_markets(Some(MarketKind::Derivative)).await.unwrap();
    assert_eq!(derivatives.len(), 1);
    assert_eq!(derivatives[0].market_id, "0xperp");
    assert_eq!(port.list_calls(), 1);
}

#[tokio::test]
async fn trending_ranks_active_markets() {
    let port = StaticDataPort::new()
        .with_market(spot_market("0xaaa"), book_around("0xaaa", 10.0, 3), trades_at(&[10.0, 10.1]))
        .with_market(spot_market("0xbbb"), book_around("0xbbb", 50.0, 3), trades_at(&[40.0, 50.0]))
        .with_market(spot_market("0xidle"), book_around("0xidle", 3.0, 3), vec![]);
    let (service, _) = build(port, AnalyticsConfig::default());

    let trending = service.trending(10).await.unwrap();

    let ids: Vec<&str> = trending.iter().map(|t| t.market_id.as_str()).collect();
    assert_eq!(ids, vec!["0xbbb", "0xaaa"]);
    assert_eq!(trending[0].rank, 1);
    assert_eq!(trending[1].rank, 2);

    assert_eq!(service.trending(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn compare_picks_best_and_worst() {
    let port = StaticDataPort::new()
        .with_market(spot_market("0xup"), book_around("0xup", 110.0, 3), trades_at(&[100.0, 110.0]))
        .with_market(spot_market("0xdown"), book_around("0xdown", 97.0, 3), trades_at(&[100.0, 97.0]));
    let (service, _) = build(port, AnalyticsConfig::default());

    let result = service
        .compare(&["0xup".to_string(), "0xdown".to_string(), "0xup".to_string()])
        .await
        .unwrap();

    assert_eq!(result.markets, vec!["0xup", "0xdown"]);
    assert_eq!(result.best_performer, "0xup");
    assert_eq!(result.worst_performer, "0xdown");
    assert!((result.average_price_change - 3.5).abs() < 1e-9);
    assert!((result.average_volume - 203.5).abs() < 1e-9);
}

#[tokio::test]
async fn compare_validates_identifiers() {
    let (service, _) = build(inj_port(), AnalyticsConfig::default());

    assert!(matches!(service.compare(&[]).await, Err(AnalyticsError::InvalidInput(_))));
    assert!(matches!(
        service.compare(&["0xinj".to_string(), " ".to_string()]).await,
        Err(AnalyticsError::InvalidInput(_))
    ));

    let too_many: Vec<String> = (0..11).map(|i| format!("0x{:02}", i)).collect();
    assert!(matches!(service.compare(&too_many).await, Err(AnalyticsError::InvalidInput(_))));

    assert!(matches!(
        service.compare(&["0xinj".to_string(), "0xmissing".to_string()]).await,
        Err(AnalyticsError::NotFound(_))
    ));
}

#[tokio::test]
async fn health_and_clear_cache() {
    let (service, _) = build(inj_port(), AnalyticsConfig::default());

    service.metrics("0xinj").await.unwrap();
    let health = service.health();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.cache.capacity, 1000);
    assert_eq!(health.cache.ttl_secs, 60);
    // markets, order book, trades, metrics
    assert_eq!(health.cache.entries, 4);

    assert_eq!(service.clear_cache(), 4);
    assert_eq!(service.health().cache.entries, 0);
}
