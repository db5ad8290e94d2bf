//! Risk-seeking entry evaluators (volatility and liquidity).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{EvaluatorConfig, PatternConfig};
use crate::market::CachedMarketData;
use crate::pattern::{AtomicPattern, RiskCategory};
use crate::state::{Job, JobStore};

use super::math::{decay_confidence, severity_from_ratio};
use super::Evaluator;

fn group_by_symbol(jobs: &[Job]) -> HashMap<String, Vec<&Job>> {
    let mut by_symbol: HashMap<String, Vec<&Job>> = HashMap::new();
    for job in jobs {
        by_symbol.entry(job.symbol.clone()).or_default().push(job);
    }
    by_symbol
}

/// Flags recent entries into symbols trading above the volatility threshold.
pub struct VolatilityEntryEvaluator {
    jobs: Arc<JobStore>,
    market: Arc<CachedMarketData>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl VolatilityEntryEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        market: Arc<CachedMarketData>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            market,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for VolatilityEntryEvaluator {
    fn id(&self) -> &'static str {
        "high_volatility_entry"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let recent = self
            .jobs
            .recent_jobs(user_id, self.evaluators.recent_window_minutes);
        if recent.is_empty() {
            return Ok(Vec::new());
        }

        let mut patterns = Vec::new();
        for (symbol, jobs) in group_by_symbol(&recent) {
            let Some(volatility) = self.market.volatility(&symbol).await else {
                continue;
            };
            if volatility <= self.evaluators.volatility_threshold {
                continue;
            }

            let ratio = volatility / self.evaluators.volatility_threshold;
            let last = jobs.last().map(|j| j.created_at).unwrap_or_default();
            let first = jobs.first().map(|j| j.created_at).unwrap_or(last);
            let severity = decay_confidence(
                severity_from_ratio(ratio, self.evaluators.max_confidence),
                last,
                self.evaluators.decay_half_life_minutes,
            );
            if severity <= 0.0 {
                continue;
            }

            let mut pattern =
                AtomicPattern::new(self.id(), user_id, severity, RiskCategory::RiskSeeking)
                    .with_jobs(jobs.iter().map(|j| j.job_id.clone()).collect())
                    .with_window(first, Some(last))
                    .with_ttl(self.patterns.default_ttl_minutes)
                    .unique()
                    .with_detail("symbol", json!(symbol))
                    .with_detail("volatility", json!(volatility))
                    .with_detail("threshold", json!(self.evaluators.volatility_threshold));
            if let Some(position_key) = jobs.iter().find_map(|j| j.position_key.clone()) {
                pattern = pattern.with_position(&position_key);
            }
            patterns.push(pattern);
        }
        Ok(patterns)
    }
}

/// Flags recent entries into thin markets (wide spread or shallow depth).
pub struct ThinLiquidityEvaluator {
    jobs: Arc<JobStore>,
    market: Arc<CachedMarketData>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl ThinLiquidityEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        market: Arc<CachedMarketData>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            market,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for ThinLiquidityEvaluator {
    fn id(&self) -> &'static str {
        "thin_liquidity_entry"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let recent = self
            .jobs
            .recent_jobs(user_id, self.evaluators.recent_window_minutes);
        if recent.is_empty() {
            return Ok(Vec::new());
        }

        let mut patterns = Vec::new();
        for (symbol, jobs) in group_by_symbol(&recent) {
            let Some(liquidity) = self.market.liquidity(&symbol).await else {
                continue;
            };

            // Worst of the two thinness dimensions drives the ratio.
            let spread_ratio = liquidity.spread / self.evaluators.max_spread;
            let depth_ratio = if liquidity.depth > 0.0 {
                self.evaluators.min_depth / liquidity.depth
            } else {
                2.0
            };
            let ratio = spread_ratio.max(depth_ratio);
            if ratio <= 1.0 {
                continue;
            }

            let last = jobs.last().map(|j| j.created_at).unwrap_or_default();
            let first = jobs.first().map(|j| j.created_at).unwrap_or(last);
            let severity = decay_confidence(
                severity_from_ratio(ratio, self.evaluators.max_confidence),
                last,
                self.evaluators.decay_half_life_minutes,
            );
            if severity <= 0.0 {
                continue;
            }

            patterns.push(
                AtomicPattern::new(self.id(), user_id, severity, RiskCategory::RiskSeeking)
                    .with_jobs(jobs.iter().map(|j| j.job_id.clone()).collect())
                    .with_window(first, Some(last))
                    .with_ttl(self.patterns.default_ttl_minutes)
                    .unique()
                    .with_detail("symbol", json!(symbol))
                    .with_detail("spread", json!(liquidity.spread))
                    .with_detail("depth", json!(liquidity.depth)),
            );
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{LiquidityMetrics, MarketCacheConfig, StaticMarketData};
    use crate::state::JobSide;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn job(id: &str, symbol: &str, minutes_ago: i64) -> Job {
        Job {
            job_id: id.to_string(),
            user_id: "user-1".to_string(),
            symbol: symbol.to_string(),
            side: JobSide::Buy,
            notional: dec!(500),
            position_key: Some("pos-1".to_string()),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_volatile_entry_fires_with_position_key() {
        let jobs = Arc::new(JobStore::new());
        jobs.record_job(job("j1", "MEMEUSDT", 1));

        let provider = StaticMarketData::new();
        provider.set_volatility("MEMEUSDT", 1.6); // double the default threshold
        let market = Arc::new(CachedMarketData::new(
            Arc::new(provider),
            MarketCacheConfig::default(),
        ));

        let evaluator = VolatilityEntryEvaluator::new(
            jobs,
            market,
            EvaluatorConfig::default(),
            PatternConfig::default(),
        );
        let patterns = evaluator.evaluate("user-1").await.unwrap();

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].position_key.as_deref(), Some("pos-1"));
        assert!(patterns[0].severity > 0.8);
    }

    #[tokio::test]
    async fn test_thin_liquidity_fires_on_wide_spread() {
        let jobs = Arc::new(JobStore::new());
        jobs.record_job(job("j1", "ALTUSDT", 1));

        let provider = StaticMarketData::new();
        provider.set_liquidity(
            "ALTUSDT",
            LiquidityMetrics {
                spread: 0.02,
                depth: 100_000.0,
            },
        );
        let market = Arc::new(CachedMarketData::new(
            Arc::new(provider),
            MarketCacheConfig::default(),
        ));

        let evaluator = ThinLiquidityEvaluator::new(
            jobs,
            market,
            EvaluatorConfig::default(),
            PatternConfig::default(),
        );
        let patterns = evaluator.evaluate("user-1").await.unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern_id, "thin_liquidity_entry");
    }

    #[tokio::test]
    async fn test_missing_market_data_skips() {
        let jobs = Arc::new(JobStore::new());
        jobs.record_job(job("j1", "BTCUSDT", 1));

        let market = Arc::new(CachedMarketData::new(
            Arc::new(StaticMarketData::new()),
            MarketCacheConfig::default(),
        ));
        let evaluator = VolatilityEntryEvaluator::new(
            jobs,
            market,
            EvaluatorConfig::default(),
            PatternConfig::default(),
        );
        assert!(evaluator.evaluate("user-1").await.unwrap().is_empty());
    }
}
