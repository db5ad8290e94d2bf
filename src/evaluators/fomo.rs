//! FOMO entry evaluator.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::config::{EvaluatorConfig, PatternConfig};
use crate::market::CachedMarketData;
use crate::pattern::{AtomicPattern, RiskCategory};
use crate::state::{Job, JobStore};

use super::math::decay_confidence;
use super::Evaluator;

/// Flags recent entries into hyped symbols. Severity scales with the hype
/// score and decays with time since the entry. Symbols without hype data are
/// skipped.
pub struct FomoEvaluator {
    jobs: Arc<JobStore>,
    market: Arc<CachedMarketData>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl FomoEvaluator {
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
impl Evaluator for FomoEvaluator {
    fn id(&self) -> &'static str {
        "fomo_entry"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let recent = self
            .jobs
            .recent_jobs(user_id, self.evaluators.recent_window_minutes);
        if recent.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_symbol: HashMap<String, Vec<&Job>> = HashMap::new();
        for job in &recent {
            by_symbol.entry(job.symbol.clone()).or_default().push(job);
        }

        let mut patterns = Vec::new();
        for (symbol, jobs) in by_symbol {
            let Some(hype) = self.market.hype(&symbol).await else {
                trace!(symbol, "No hype data, skipping FOMO check");
                continue;
            };
            if hype.hype_score < self.evaluators.hype_threshold {
                continue;
            }

            let last = jobs.last().map(|j| j.created_at).unwrap_or_default();
            let first = jobs.first().map(|j| j.created_at).unwrap_or(last);
            let base = (hype.hype_score * self.evaluators.max_confidence).clamp(0.0, 1.0);
            let severity =
                decay_confidence(base, last, self.evaluators.decay_half_life_minutes);

            let mut pattern = AtomicPattern::new(self.id(), user_id, severity, RiskCategory::Fomo)
                .with_jobs(jobs.iter().map(|j| j.job_id.clone()).collect())
                .with_window(first, Some(last))
                .with_ttl(self.patterns.default_ttl_minutes)
                .unique()
                .with_detail("symbol", json!(symbol))
                .with_detail("hype_score", json!(hype.hype_score))
                .with_detail("mention_velocity", json!(hype.mention_velocity));
            if let Some(position_key) = jobs.iter().find_map(|j| j.position_key.clone()) {
                pattern = pattern.with_position(&position_key);
            }
            patterns.push(pattern);
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{HypeMetrics, MarketCacheConfig, StaticMarketData};
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
            position_key: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn market_with_hype(symbol: &str, score: f64) -> Arc<CachedMarketData> {
        let provider = StaticMarketData::new();
        provider.set_hype(
            symbol,
            HypeMetrics {
                hype_score: score,
                mention_velocity: 3.0,
            },
        );
        Arc::new(CachedMarketData::new(
            Arc::new(provider),
            MarketCacheConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_hyped_entry_fires() {
        let jobs = Arc::new(JobStore::new());
        jobs.record_job(job("j1", "DOGEUSDT", 2));

        let evaluator = FomoEvaluator::new(
            jobs,
            market_with_hype("DOGEUSDT", 0.9),
            EvaluatorConfig::default(),
            PatternConfig::default(),
        );
        let patterns = evaluator.evaluate("user-1").await.unwrap();

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern_id, "fomo_entry");
        assert!(patterns[0].severity > 0.7);
    }

    #[tokio::test]
    async fn test_no_hype_data_skips_silently() {
        let jobs = Arc::new(JobStore::new());
        jobs.record_job(job("j1", "BTCUSDT", 2));

        let evaluator = FomoEvaluator::new(
            jobs,
            market_with_hype("OTHERUSDT", 0.9),
            EvaluatorConfig::default(),
            PatternConfig::default(),
        );
        assert!(evaluator.evaluate("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_calm_symbol_is_quiet() {
        let jobs = Arc::new(JobStore::new());
        jobs.record_job(job("j1", "BTCUSDT", 2));

        let evaluator = FomoEvaluator::new(
            jobs,
            market_with_hype("BTCUSDT", 0.2),
            EvaluatorConfig::default(),
            PatternConfig::default(),
        );
        assert!(evaluator.evaluate("user-1").await.unwrap().is_empty());
    }
}
