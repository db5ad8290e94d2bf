//! Limit-violation evaluators.
//!
//! Each check compares one dimension of a user's activity against that
//! user's configured caps and derives severity from the violation ratio via
//! the shared curve, so severities are comparable across the family.
//! A missing `UserLimits` record or a missing individual cap skips the check.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::trace;

use crate::config::{EvaluatorConfig, PatternConfig};
use crate::pattern::{AtomicPattern, RiskCategory};
use crate::state::{Job, JobStore, LimitsProvider, PositionStore};
use crate::utils::decimal::ratio_f64;

use super::math::severity_from_ratio;
use super::Evaluator;

/// Flags single jobs whose notional exceeds the per-job cap.
pub struct OversizedTradeEvaluator {
    jobs: Arc<JobStore>,
    limits: Arc<dyn LimitsProvider>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl OversizedTradeEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        limits: Arc<dyn LimitsProvider>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            limits,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for OversizedTradeEvaluator {
    fn id(&self) -> &'static str {
        "oversized_trade"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let Some(cap) = self
            .limits
            .get_user_limits(user_id)
            .and_then(|l| l.max_job_notional)
        else {
            trace!(user_id, "No single-job cap configured, skipping");
            return Ok(Vec::new());
        };

        let mut patterns = Vec::new();
        for job in self.jobs.jobs_today(user_id) {
            if job.notional <= cap {
                continue;
            }
            let ratio = ratio_f64(job.notional, cap);
            let severity = severity_from_ratio(ratio, self.evaluators.max_confidence);
            patterns.push(
                AtomicPattern::new(self.id(), user_id, severity, RiskCategory::Overconfidence)
                    .with_jobs(vec![job.job_id.clone()])
                    .with_window(job.created_at, None)
                    .with_ttl(self.patterns.default_ttl_minutes)
                    .unique()
                    .with_detail("symbol", json!(job.symbol))
                    .with_detail("notional", json!(job.notional.to_string()))
                    .with_detail("cap", json!(cap.to_string())),
            );
        }
        Ok(patterns)
    }
}

/// Flags a day whose job count exceeds the daily cap.
pub struct DailyTradeLimitEvaluator {
    jobs: Arc<JobStore>,
    limits: Arc<dyn LimitsProvider>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl DailyTradeLimitEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        limits: Arc<dyn LimitsProvider>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            limits,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for DailyTradeLimitEvaluator {
    fn id(&self) -> &'static str {
        "daily_trade_limit"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let Some(cap) = self
            .limits
            .get_user_limits(user_id)
            .and_then(|l| l.max_daily_jobs)
        else {
            return Ok(Vec::new());
        };

        let today = self.jobs.jobs_today(user_id);
        if today.len() <= cap as usize || today.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = today.len() as f64 / cap.max(1) as f64;
        let severity = severity_from_ratio(ratio, self.evaluators.max_confidence);
        let first = today.first().map(|j| j.created_at).unwrap_or_default();
        let last = today.last().map(|j| j.created_at);

        Ok(vec![AtomicPattern::new(
            self.id(),
            user_id,
            severity,
            RiskCategory::Overconfidence,
        )
        .with_jobs(today.iter().map(|j| j.job_id.clone()).collect())
        .with_window(first, last)
        .with_ttl(self.patterns.default_ttl_minutes)
        .unique()
        .with_detail("job_count", json!(today.len()))
        .with_detail("cap", json!(cap))])
    }
}

/// Flags a day whose total traded notional exceeds the volume cap.
pub struct VolumeLimitEvaluator {
    jobs: Arc<JobStore>,
    limits: Arc<dyn LimitsProvider>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl VolumeLimitEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        limits: Arc<dyn LimitsProvider>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            limits,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for VolumeLimitEvaluator {
    fn id(&self) -> &'static str {
        "volume_limit"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let Some(cap) = self
            .limits
            .get_user_limits(user_id)
            .and_then(|l| l.max_daily_volume)
        else {
            return Ok(Vec::new());
        };

        let volume = self.jobs.volume_today(user_id);
        if volume <= cap {
            return Ok(Vec::new());
        }

        let today = self.jobs.jobs_today(user_id);
        let ratio = ratio_f64(volume, cap);
        let severity = severity_from_ratio(ratio, self.evaluators.max_confidence);
        let first = today.first().map(|j| j.created_at).unwrap_or_default();
        let last = today.last().map(|j| j.created_at);

        Ok(vec![AtomicPattern::new(
            self.id(),
            user_id,
            severity,
            RiskCategory::Overconfidence,
        )
        .with_jobs(today.iter().map(|j| j.job_id.clone()).collect())
        .with_window(first, last)
        .with_ttl(self.patterns.default_ttl_minutes)
        .unique()
        .with_detail("volume", json!(volume.to_string()))
        .with_detail("cap", json!(cap.to_string()))])
    }
}

/// Flags consecutive jobs spaced closer than the user's cooldown.
pub struct CooldownEvaluator {
    jobs: Arc<JobStore>,
    limits: Arc<dyn LimitsProvider>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl CooldownEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        limits: Arc<dyn LimitsProvider>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            limits,
            evaluators,
            patterns,
        }
    }

    fn pair_pattern(&self, user_id: &str, earlier: &Job, later: &Job, cooldown: i64) -> AtomicPattern {
        let gap_minutes = (later.created_at - earlier.created_at).num_seconds() as f64 / 60.0;
        // A zero gap saturates the curve.
        let ratio = if gap_minutes <= 0.0 {
            2.0
        } else {
            cooldown as f64 / gap_minutes
        };
        let severity = severity_from_ratio(ratio, self.evaluators.max_confidence);

        AtomicPattern::new(self.id(), user_id, severity, RiskCategory::Overconfidence)
            .with_jobs(vec![earlier.job_id.clone(), later.job_id.clone()])
            .with_window(earlier.created_at, Some(later.created_at))
            .with_ttl(self.patterns.default_ttl_minutes)
            .unique()
            .with_detail("gap_minutes", json!(gap_minutes))
            .with_detail("cooldown_minutes", json!(cooldown))
    }
}

#[async_trait]
impl Evaluator for CooldownEvaluator {
    fn id(&self) -> &'static str {
        "cooldown_violation"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let Some(cooldown) = self
            .limits
            .get_user_limits(user_id)
            .and_then(|l| l.cooldown_minutes)
        else {
            return Ok(Vec::new());
        };

        let today = self.jobs.jobs_today(user_id);
        let patterns = today
            .windows(2)
            .filter(|pair| {
                (pair[1].created_at - pair[0].created_at).num_minutes() < cooldown
            })
            .map(|pair| self.pair_pattern(user_id, &pair[0], &pair[1], cooldown))
            .collect();
        Ok(patterns)
    }
}

/// Flags more concurrently open positions than the user's cap.
pub struct ConcurrencyLimitEvaluator {
    positions: Arc<PositionStore>,
    limits: Arc<dyn LimitsProvider>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl ConcurrencyLimitEvaluator {
    pub fn new(
        positions: Arc<PositionStore>,
        limits: Arc<dyn LimitsProvider>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            positions,
            limits,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for ConcurrencyLimitEvaluator {
    fn id(&self) -> &'static str {
        "concurrency_limit"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let Some(cap) = self
            .limits
            .get_user_limits(user_id)
            .and_then(|l| l.max_open_positions)
        else {
            return Ok(Vec::new());
        };

        let open = self.positions.open_position_count(user_id);
        if open <= cap as usize {
            return Ok(Vec::new());
        }

        let ratio = open as f64 / cap.max(1) as f64;
        let severity = severity_from_ratio(ratio, self.evaluators.max_confidence);

        Ok(vec![AtomicPattern::new(
            self.id(),
            user_id,
            severity,
            RiskCategory::Overconfidence,
        )
        .with_ttl(self.patterns.default_ttl_minutes)
        .unique()
        .with_detail("open_positions", json!(open))
        .with_detail("cap", json!(cap))])
    }
}
