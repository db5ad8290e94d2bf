//! HTTP-backed market data provider.
//!
//! Talks to a JSON market analytics service:
//! - `GET /v1/volatility/{symbol}`
//! - `GET /v1/liquidity/{symbol}`
//! - `GET /v1/hype/{symbol}`
//!
//! A 404 means the service has no data for the symbol and maps to `Ok(None)`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{HypeMetrics, LiquidityMetrics, MarketDataError, MarketDataProvider};

#[derive(Debug, Deserialize)]
struct VolatilityResponse {
    volatility: f64,
}

#[derive(Debug, Deserialize)]
struct LiquidityResponse {
    spread: f64,
    depth: f64,
}

#[derive(Debug, Deserialize)]
struct HypeResponse {
    hype_score: f64,
    #[serde(default)]
    mention_velocity: f64,
}

/// Market analytics API client.
#[derive(Debug, Clone)]
pub struct HttpMarketDataProvider {
    client: Client,
    base_url: String,
}

impl HttpMarketDataProvider {
    /// Create a client for the given base URL.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, MarketDataError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<Option<T>, MarketDataError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url, "No market data for symbol");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MarketDataError::Status(status.as_u16()));
        }

        Ok(Some(response.json::<T>().await?))
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn get_volatility(&self, symbol: &str) -> Result<Option<f64>, MarketDataError> {
        let response: Option<VolatilityResponse> =
            self.get_json(&format!("v1/volatility/{}", symbol)).await?;
        Ok(response.map(|r| r.volatility))
    }

    async fn get_liquidity_metrics(
        &self,
        symbol: &str,
    ) -> Result<Option<LiquidityMetrics>, MarketDataError> {
        let response: Option<LiquidityResponse> =
            self.get_json(&format!("v1/liquidity/{}", symbol)).await?;
        Ok(response.map(|r| LiquidityMetrics {
            spread: r.spread,
            depth: r.depth,
        }))
    }

    async fn get_hype_metrics(&self, symbol: &str) -> Result<Option<HypeMetrics>, MarketDataError> {
        let response: Option<HypeResponse> = self.get_json(&format!("v1/hype/{}", symbol)).await?;
        Ok(response.map(|r| HypeMetrics {
            hype_score: r.hype_score,
            mention_velocity: r.mention_velocity,
        }))
    }
}
