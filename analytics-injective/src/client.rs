//! Injective API client
//!
//! Reads market listings and order books from the chain LCD and recent
//! trades from the exchange indexer, and serves them through
//! [`MarketDataPort`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use analytics_core::{
    AnalyticsResult, MarketDataPort, MarketDescriptor, MarketKind, OrderBookSnapshot,
    TradeRecord, UpstreamConfig,
};

use crate::error::InjectiveError;
use crate::types::{to_trades, MarketsResponse, OrderbookResponse, Scaling, TradesResponse};

/// Injective REST client
#[derive(Clone)]
pub struct InjectiveClient {
    client: Client,
    lcd_url: String,
    indexer_url: String,
    scaling: Scaling,
}

impl InjectiveClient {
    /// Create a client for the configured endpoints
    pub fn new(config: &UpstreamConfig) -> Result<Self, InjectiveError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            lcd_url: config.lcd_endpoint.trim_end_matches('/').to_string(),
            indexer_url: config.indexer_endpoint.trim_end_matches('/').to_string(),
            scaling: Scaling {
                price_decimals: config.price_decimals,
                quantity_decimals: config.quantity_decimals,
            },
        })
    }

    pub fn lcd_url(&self) -> &str {
        &self.lcd_url
    }

    pub fn indexer_url(&self) -> &str {
        &self.indexer_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, InjectiveError> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(InjectiveError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InjectiveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| InjectiveError::Parse(format!("{}: {}", url, e)))
    }

    /// Markets of one kind from the chain
    #[instrument(skip(self))]
    pub async fn markets(&self, kind: MarketKind) -> Result<Vec<MarketDescriptor>, InjectiveError> {
        let url = format!("{}/injective/exchange/v1beta1/{}/markets", self.lcd_url, kind);
        let response: MarketsResponse = self.get_json(&url).await?;

        let markets: Vec<MarketDescriptor> = response
            .markets
            .into_iter()
            .map(|entry| entry.into_market().to_descriptor(kind))
            .filter(|m| !m.market_id.is_empty())
            .collect();

        debug!("Fetched {} {} markets", markets.len(), kind);
        Ok(markets)
    }

    /// Order book of one kind for a market
    #[instrument(skip(self))]
    pub async fn orderbook(
        &self,
        kind: MarketKind,
        market_id: &str,
        depth: usize,
    ) -> Result<(OrderbookResponse, OrderBookSnapshot), InjectiveError> {
        let url = format!(
            "{}/injective/exchange/v1beta1/{}/orderbook/{}?limit={}",
            self.lcd_url, kind, market_id, depth
        );
        let response: OrderbookResponse = self.get_json(&url).await?;
        let snapshot = response.to_snapshot(market_id, kind, depth, &self.scaling);
        Ok((response, snapshot))
    }

    /// Recent trades of one kind for a market, oldest first
    #[instrument(skip(self))]
    pub async fn trades(
        &self,
        kind: MarketKind,
        market_id: &str,
        limit: usize,
    ) -> Result<Vec<TradeRecord>, InjectiveError> {
        let url = format!(
            "{}/api/exchange/{}/v1/trades?marketId={}&limit={}",
            self.indexer_url, kind, market_id, limit
        );
        let response: TradesResponse = self.get_json(&url).await?;
        Ok(to_trades(&response.trades, &self.scaling))
    }
}

#[async_trait]
impl MarketDataPort for InjectiveClient {
    async fn list_markets(&self, kind: Option<MarketKind>) -> AnalyticsResult<Vec<MarketDescriptor>> {
        match kind {
            Some(kind) => Ok(self.markets(kind).await?),
            None => {
                let (derivatives, spot) = tokio::join!(
                    self.markets(MarketKind::Derivative),
                    self.markets(MarketKind::Spot)
                );

                // One listing failing still leaves the other usable
                match (derivatives, spot) {
                    (Ok(mut derivatives), Ok(spot)) => {
                        derivatives.extend(spot);
                        Ok(derivatives)
                    }
                    (Ok(markets), Err(e)) | (Err(e), Ok(markets)) => {
                        warn!("Partial market listing: {}", e);
                        Ok(markets)
                    }
                    (Err(e), Err(_)) => Err(e.into()),
                }
            }
        }
    }

    /// Derivative book first, spot when the market is not a derivative
    async fn get_orderbook(&self, market_id: &str, depth: usize) -> AnalyticsResult<OrderBookSnapshot> {
        let derivative = self.orderbook(MarketKind::Derivative, market_id, depth).await;

        match derivative {
            Ok((raw, snapshot)) if !raw.is_empty() => return Ok(snapshot),
            Ok(_) => debug!("Empty derivative book for {}, trying spot", market_id),
            Err(ref e) => debug!("Derivative book for {} unavailable ({}), trying spot", market_id, e),
        }

        match (self.orderbook(MarketKind::Spot, market_id, depth).await, derivative) {
            (Ok((raw, snapshot)), _) if !raw.is_empty() => Ok(snapshot),
            // Both empty: report the derivative view
            (Ok(_), Ok((_, snapshot))) => Ok(snapshot),
            (Ok((_, snapshot)), Err(_)) => Ok(snapshot),
            (Err(spot_err), Ok((_, snapshot))) => {
                debug!("Spot book for {} unavailable: {}", market_id, spot_err);
                Ok(snapshot)
            }
            (Err(spot_err), Err(derivative_err)) => {
                if spot_err.is_not_found() && derivative_err.is_not_found() {
                    Err(InjectiveError::NotFound(format!("Market {} not found", market_id)).into())
                } else if spot_err.is_not_found() {
                    Err(derivative_err.into())
                } else {
                    Err(spot_err.into())
                }
            }
        }
    }

    /// Derivative trades first, spot trades when there are none
    async fn get_trades(&self, market_id: &str, limit: usize) -> AnalyticsResult<Vec<TradeRecord>> {
        let derivative = self.trades(MarketKind::Derivative, market_id, limit).await;
        if let Ok(trades) = &derivative {
            if !trades.is_empty() {
                return Ok(trades.clone());
            }
        }

        match (self.trades(MarketKind::Spot, market_id, limit).await, derivative) {
            (Ok(trades), _) => Ok(trades),
            (Err(spot_err), Ok(trades)) => {
                debug!("Spot trades for {} unavailable: {}", market_id, spot_err);
                Ok(trades)
            }
            (Err(spot_err), Err(derivative_err)) => {
                warn!(
                    "Trades for {} unavailable (derivative: {}, spot: {})",
                    market_id, derivative_err, spot_err
                );
                Err(spot_err.into())
            }
        }
    }
}
