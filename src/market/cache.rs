//! TTL-caching wrapper around a market data provider.
//!
//! Each metric family has its own TTL: volatility moves slowly, liquidity
//! and hype faster. Provider errors are logged and served as `None` so the
//! dependent evaluator check is skipped, never escalated.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

use super::{HypeMetrics, LiquidityMetrics, MarketDataProvider};

/// TTLs for the cached metric families.
#[derive(Debug, Clone)]
pub struct MarketCacheConfig {
    pub volatility_ttl_secs: i64,
    pub liquidity_ttl_secs: i64,
    pub hype_ttl_secs: i64,
}

impl Default for MarketCacheConfig {
    fn default() -> Self {
        Self {
            volatility_ttl_secs: 300,
            liquidity_ttl_secs: 60,
            hype_ttl_secs: 120,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: Option<T>,
    fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, ttl_secs: i64, now: DateTime<Utc>) -> bool {
        now - self.fetched_at <= Duration::seconds(ttl_secs)
    }
}

/// Caching facade over a remote market data provider.
pub struct CachedMarketData {
    provider: Arc<dyn MarketDataProvider>,
    config: MarketCacheConfig,
    volatility: Mutex<HashMap<String, CacheEntry<f64>>>,
    liquidity: Mutex<HashMap<String, CacheEntry<LiquidityMetrics>>>,
    hype: Mutex<HashMap<String, CacheEntry<HypeMetrics>>>,
}

impl CachedMarketData {
    /// Wrap a provider with per-family TTL caching.
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: MarketCacheConfig) -> Self {
        Self {
            provider,
            config,
            volatility: Mutex::new(HashMap::new()),
            liquidity: Mutex::new(HashMap::new()),
            hype: Mutex::new(HashMap::new()),
        }
    }

    /// Volatility for a symbol, cached. `None` when unknown or unavailable.
    pub async fn volatility(&self, symbol: &str) -> Option<f64> {
        if let Some(hit) = cached_value(&self.volatility, symbol, self.config.volatility_ttl_secs) {
            return hit;
        }
        let fetched = match self.provider.get_volatility(symbol).await {
            Ok(value) => value,
            Err(e) => {
                warn!(symbol, error = %e, "Volatility lookup failed, skipping");
                None
            }
        };
        insert_value(&self.volatility, symbol, fetched);
        fetched
    }

    /// Liquidity metrics for a symbol, cached.
    pub async fn liquidity(&self, symbol: &str) -> Option<LiquidityMetrics> {
        if let Some(hit) = cached_value(&self.liquidity, symbol, self.config.liquidity_ttl_secs) {
            return hit;
        }
        let fetched = match self.provider.get_liquidity_metrics(symbol).await {
            Ok(value) => value,
            Err(e) => {
                warn!(symbol, error = %e, "Liquidity lookup failed, skipping");
                None
            }
        };
        insert_value(&self.liquidity, symbol, fetched);
        fetched
    }

    /// Hype metrics for a symbol, cached.
    pub async fn hype(&self, symbol: &str) -> Option<HypeMetrics> {
        if let Some(hit) = cached_value(&self.hype, symbol, self.config.hype_ttl_secs) {
            return hit;
        }
        let fetched = match self.provider.get_hype_metrics(symbol).await {
            Ok(value) => value,
            Err(e) => {
                warn!(symbol, error = %e, "Hype lookup failed, skipping");
                None
            }
        };
        insert_value(&self.hype, symbol, fetched);
        fetched
    }
}

/// Fresh cache hit, if any. The outer `Option` distinguishes "no fresh entry"
/// from a cached "provider had no data" (`Some(None)`).
fn cached_value<T: Copy>(
    cache: &Mutex<HashMap<String, CacheEntry<T>>>,
    symbol: &str,
    ttl_secs: i64,
) -> Option<Option<T>> {
    let guard = cache.lock().unwrap();
    let entry = guard.get(symbol)?;
    if entry.is_fresh(ttl_secs, Utc::now()) {
        trace!(symbol, "Market data cache hit");
        Some(entry.value)
    } else {
        None
    }
}

fn insert_value<T>(cache: &Mutex<HashMap<String, CacheEntry<T>>>, symbol: &str, value: Option<T>) {
    let mut guard = cache.lock().unwrap();
    guard.insert(
        symbol.to_string(),
        CacheEntry {
            value,
            fetched_at: Utc::now(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketDataError, StaticMarketData};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        inner: StaticMarketData,
    }

    #[async_trait]
    impl MarketDataProvider for CountingProvider {
        async fn get_volatility(&self, symbol: &str) -> Result<Option<f64>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_volatility(symbol).await
        }

        async fn get_liquidity_metrics(
            &self,
            symbol: &str,
        ) -> Result<Option<LiquidityMetrics>, MarketDataError> {
            self.inner.get_liquidity_metrics(symbol).await
        }

        async fn get_hype_metrics(
            &self,
            symbol: &str,
        ) -> Result<Option<HypeMetrics>, MarketDataError> {
            self.inner.get_hype_metrics(symbol).await
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl MarketDataProvider for FailingProvider {
        async fn get_volatility(&self, _symbol: &str) -> Result<Option<f64>, MarketDataError> {
            Err(MarketDataError::Status(503))
        }

        async fn get_liquidity_metrics(
            &self,
            _symbol: &str,
        ) -> Result<Option<LiquidityMetrics>, MarketDataError> {
            Err(MarketDataError::Status(503))
        }

        async fn get_hype_metrics(
            &self,
            _symbol: &str,
        ) -> Result<Option<HypeMetrics>, MarketDataError> {
            Err(MarketDataError::Status(503))
        }
    }

    #[test]
    fn test_second_lookup_is_served_from_cache() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            inner: StaticMarketData::new(),
        });
        provider.inner.set_volatility("BTCUSDT", 0.8);

        let cache = CachedMarketData::new(provider.clone(), MarketCacheConfig::default());

        tokio_test::block_on(async {
            assert_eq!(cache.volatility("BTCUSDT").await, Some(0.8));
            assert_eq!(cache.volatility("BTCUSDT").await, Some(0.8));
        });
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_failure_degrades_to_none() {
        let cache = CachedMarketData::new(Arc::new(FailingProvider), MarketCacheConfig::default());
        tokio_test::block_on(async {
            assert_eq!(cache.volatility("BTCUSDT").await, None);
            assert!(cache.liquidity("BTCUSDT").await.is_none());
            assert!(cache.hype("BTCUSDT").await.is_none());
        });
    }
}
