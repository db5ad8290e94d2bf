//! Loss-behavior evaluators (sunk-cost holds and loss chasing).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::trace;

use crate::config::{EvaluatorConfig, PatternConfig};
use crate::pattern::{AtomicPattern, RiskCategory};
use crate::state::{EquityStore, JobStore, PositionStore};

use super::math::severity_from_ratio;
use super::Evaluator;

/// Flags positions held underwater beyond the loss fraction and holding
/// threshold. One unique, position-keyed pattern per offending position.
pub struct SunkCostEvaluator {
    positions: Arc<PositionStore>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl SunkCostEvaluator {
    pub fn new(
        positions: Arc<PositionStore>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            positions,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for SunkCostEvaluator {
    fn id(&self) -> &'static str {
        "sunk_cost_hold"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let min_loss = self.evaluators.sunk_cost_loss_fraction;
        let min_hours = self.evaluators.sunk_cost_min_hours;

        let mut patterns = Vec::new();
        for position in self.positions.open_positions(user_id) {
            let loss = position.loss_fraction();
            let hours = position.hours_open();
            if loss < min_loss || hours < min_hours {
                continue;
            }

            // Loss depth relative to the tolerated fraction drives severity.
            let ratio = loss / min_loss;
            let severity = severity_from_ratio(ratio, self.evaluators.max_confidence);
            if severity <= 0.0 {
                continue;
            }

            trace!(
                user_id,
                position_key = %position.position_key,
                loss_fraction = loss,
                hours_open = hours,
                "Sunk-cost hold detected"
            );

            patterns.push(
                AtomicPattern::new(self.id(), user_id, severity, RiskCategory::LossBehavior)
                    .with_position(&position.position_key)
                    .with_window(position.opened_at, Some(position.updated_at))
                    .with_ttl(self.patterns.default_ttl_minutes)
                    .unique()
                    .with_detail("symbol", json!(position.symbol))
                    .with_detail("loss_fraction", json!(loss))
                    .with_detail("hours_open", json!(hours)),
            );
        }
        Ok(patterns)
    }
}

/// Flags new jobs placed while the account is in drawdown or while the
/// job's own position is underwater — chasing losses instead of stepping back.
pub struct LossChasingEvaluator {
    jobs: Arc<JobStore>,
    positions: Arc<PositionStore>,
    equity: Arc<EquityStore>,
    evaluators: EvaluatorConfig,
    patterns: PatternConfig,
}

impl LossChasingEvaluator {
    pub fn new(
        jobs: Arc<JobStore>,
        positions: Arc<PositionStore>,
        equity: Arc<EquityStore>,
        evaluators: EvaluatorConfig,
        patterns: PatternConfig,
    ) -> Self {
        Self {
            jobs,
            positions,
            equity,
            evaluators,
            patterns,
        }
    }
}

#[async_trait]
impl Evaluator for LossChasingEvaluator {
    fn id(&self) -> &'static str {
        "loss_chasing"
    }

    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>> {
        let recent = self
            .jobs
            .recent_jobs(user_id, self.evaluators.loss_chasing_window_minutes);
        if recent.is_empty() {
            return Ok(Vec::new());
        }

        let drawdown = self
            .equity
            .drawdown(user_id)
            .map(|d| d.drawdown)
            .unwrap_or(0.0);
        let account_in_drawdown = drawdown >= self.evaluators.loss_chasing_drawdown;

        let mut patterns = Vec::new();
        for job in &recent {
            // A job "chases" when its own position is underwater, or when the
            // whole account is in drawdown and the user keeps adding.
            let position_loss = job
                .position_key
                .as_deref()
                .and_then(|key| self.positions.position(user_id, key))
                .map(|p| p.loss_fraction())
                .unwrap_or(0.0);

            let chasing_position = position_loss >= self.evaluators.sunk_cost_loss_fraction;
            if !chasing_position && !account_in_drawdown {
                continue;
            }

            let driving_loss = if chasing_position {
                position_loss / self.evaluators.sunk_cost_loss_fraction
            } else {
                drawdown / self.evaluators.loss_chasing_drawdown
            };
            let severity = severity_from_ratio(driving_loss, self.evaluators.max_confidence);
            if severity <= 0.0 {
                continue;
            }

            let mut pattern =
                AtomicPattern::new(self.id(), user_id, severity, RiskCategory::LossBehavior)
                    .with_jobs(vec![job.job_id.clone()])
                    .with_window(job.created_at, None)
                    .with_ttl(self.patterns.default_ttl_minutes)
                    .unique()
                    .with_detail("symbol", json!(job.symbol))
                    .with_detail("account_drawdown", json!(drawdown))
                    .with_detail("position_loss", json!(position_loss));
            if let Some(position_key) = &job.position_key {
                pattern = pattern.with_position(position_key);
            }
            patterns.push(pattern);
        }
        Ok(patterns)
    }
}
