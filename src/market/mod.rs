//! External market data providers.
//!
//! Evaluators consume volatility, liquidity, and hype metrics through the
//! `MarketDataProvider` trait. Providers are remote and may be unavailable;
//! the cached wrapper degrades to `None` so dependent checks are skipped
//! rather than failing a batch.

mod cache;
mod http;

pub use cache::{CachedMarketData, MarketCacheConfig};
pub use http::HttpMarketDataProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Spread/depth snapshot for one symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    /// Bid-ask spread as a fraction of mid price.
    pub spread: f64,
    /// Resting depth near the touch, in account currency.
    pub depth: f64,
}

/// Social/hype activity snapshot for one symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HypeMetrics {
    /// Normalized hype score in [0, 1].
    pub hype_score: f64,
    /// Social mention growth rate over the trailing day.
    pub mention_velocity: f64,
}

/// Errors from a remote market data provider.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Read-only market data lookups. `Ok(None)` means the provider has no data
/// for the symbol; errors mean the provider is unavailable.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Annualized realized volatility for a symbol, as a fraction.
    async fn get_volatility(&self, symbol: &str) -> Result<Option<f64>, MarketDataError>;

    /// Spread/depth metrics for a symbol.
    async fn get_liquidity_metrics(
        &self,
        symbol: &str,
    ) -> Result<Option<LiquidityMetrics>, MarketDataError>;

    /// Hype metrics for a symbol.
    async fn get_hype_metrics(&self, symbol: &str) -> Result<Option<HypeMetrics>, MarketDataError>;
}

/// Static provider for tests and simulation: serves preconfigured values.
#[derive(Debug, Default)]
pub struct StaticMarketData {
    volatility: Mutex<HashMap<String, f64>>,
    liquidity: Mutex<HashMap<String, LiquidityMetrics>>,
    hype: Mutex<HashMap<String, HypeMetrics>>,
}

impl StaticMarketData {
    /// Create an empty provider (every lookup returns `None`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the volatility served for a symbol.
    pub fn set_volatility(&self, symbol: &str, volatility: f64) {
        self.volatility
            .lock()
            .unwrap()
            .insert(symbol.to_string(), volatility);
    }

    /// Set the liquidity metrics served for a symbol.
    pub fn set_liquidity(&self, symbol: &str, metrics: LiquidityMetrics) {
        self.liquidity
            .lock()
            .unwrap()
            .insert(symbol.to_string(), metrics);
    }

    /// Set the hype metrics served for a symbol.
    pub fn set_hype(&self, symbol: &str, metrics: HypeMetrics) {
        self.hype.lock().unwrap().insert(symbol.to_string(), metrics);
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn get_volatility(&self, symbol: &str) -> Result<Option<f64>, MarketDataError> {
        Ok(self.volatility.lock().unwrap().get(symbol).copied())
    }

    async fn get_liquidity_metrics(
        &self,
        symbol: &str,
    ) -> Result<Option<LiquidityMetrics>, MarketDataError> {
        Ok(self.liquidity.lock().unwrap().get(symbol).copied())
    }

    async fn get_hype_metrics(&self, symbol: &str) -> Result<Option<HypeMetrics>, MarketDataError> {
        Ok(self.hype.lock().unwrap().get(symbol).copied())
    }
}
