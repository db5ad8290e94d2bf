//! Overtrading (burst-rate) evaluator.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::trace;

use crate::config::{EvaluatorConfig, PatternConfig};
use crate::pattern::{AtomicPattern, RiskCategory};
use crate::state::JobStore;

use super::math::{decay_confidence, severity_from_ratio};
use super::Evaluator;

/// Compares the job rate inside a short burst window against the user's
/// trailing baseline rate. Fires once the burst rate exceeds the baseline,
/// with severity from the rate ratio decayed by the recency of the last job.
pub struct OvertradingEvaluator {
    jobs: Arc<JobStore>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl OvertradingEvaluator {
    pub fn new(jobs: Arc<JobStore>, evaluators: EvaluatorConfig, patterns: PatternConfig) -> Self {
        Self {
            jobs,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for OvertradingEvaluator {
    fn id(&self) -> &'static str {
        "overtrading"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let now = Utc::now();
        let burst_window = self.evaluators.burst_window_minutes;
        let baseline_hours = self.evaluators.baseline_window_hours.max(1);

        let burst_jobs = self.jobs.recent_jobs(user_id, burst_window);
        if burst_jobs.len() < self.evaluators.min_burst_jobs {
            trace!(
                user_id,
                burst = burst_jobs.len(),
                "Burst below minimum, no overtrading signal"
            );
            return Ok(Vec::new());
        }

        let baseline_jobs =
            self.jobs
                .jobs_since(user_id, now - Duration::hours(baseline_hours));

        // Jobs per hour inside the burst window vs. the trailing baseline.
        // The baseline includes the burst itself, which only dampens the ratio.
        let burst_rate = burst_jobs.len() as f64 / (burst_window as f64 / 60.0);
        let baseline_rate = baseline_jobs.len() as f64 / baseline_hours as f64;
        if baseline_rate <= 0.0 {
            return Ok(Vec::new());
        }

        let ratio = burst_rate / baseline_rate;
        let raw_severity = severity_from_ratio(ratio, self.evaluators.max_confidence);
        if raw_severity <= 0.0 {
            return Ok(Vec::new());
        }

        let last_job_at = burst_jobs
            .last()
            .map(|j| j.created_at)
            .unwrap_or(now);
        let severity = decay_confidence(
            raw_severity,
            last_job_at,
            self.evaluators.decay_half_life_minutes,
        );

        let first_job_at = burst_jobs.first().map(|j| j.created_at).unwrap_or(now);
        Ok(vec![AtomicPattern::new(
            self.id(),
            user_id,
            severity,
            RiskCategory::Overtrading,
        )
        .with_jobs(burst_jobs.iter().map(|j| j.job_id.clone()).collect())
        .with_window(first_job_at, Some(last_job_at))
        .with_ttl(self.patterns.default_ttl_minutes)
        .unique()
        .with_detail("burst_jobs", json!(burst_jobs.len()))
        .with_detail("burst_rate_per_hour", json!(burst_rate))
        .with_detail("baseline_rate_per_hour", json!(baseline_rate))])
    }
}
