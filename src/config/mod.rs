//! Configuration management for the risk engine.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pattern::RiskCategory;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Orchestrator queue/pool parameters
    #[serde(default)]
    pub engine: EngineConfig,
    /// Pattern store and report lookback parameters
    #[serde(default)]
    pub patterns: PatternConfig,
    /// Evaluator thresholds
    #[serde(default)]
    pub evaluators: EvaluatorConfig,
    /// Composition engine parameters
    #[serde(default)]
    pub composition: CompositionConfig,
    /// Aggregation parameters
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Market data provider settings
    #[serde(default)]
    pub market: MarketConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the bounded evaluation request queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum concurrently running evaluation batches
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    /// Per-evaluator execution timeout in seconds
    #[serde(default = "default_evaluator_timeout_secs")]
    pub evaluator_timeout_secs: u64,
    /// Interval of the position-focused background sweep in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Default TTL for atomic patterns, minutes
    #[serde(default = "default_pattern_ttl_minutes")]
    pub default_ttl_minutes: i64,
    /// TTL for composite patterns, minutes
    #[serde(default = "default_composite_ttl_minutes")]
    pub composite_ttl_minutes: i64,
    /// Hours of pattern history a report cycle looks back over
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Ceiling for ratio-derived severities (0.0-1.0)
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,
    /// Half-life for recency decay of severities, minutes
    #[serde(default = "default_decay_half_life_minutes")]
    pub decay_half_life_minutes: f64,
    /// Window for burst-rate detection, minutes
    #[serde(default = "default_burst_window_minutes")]
    pub burst_window_minutes: i64,
    /// Trailing window used as the trading-rate baseline, hours
    #[serde(default = "default_baseline_window_hours")]
    pub baseline_window_hours: i64,
    /// Minimum jobs inside the burst window before overtrading fires
    #[serde(default = "default_min_burst_jobs")]
    pub min_burst_jobs: usize,
    /// Window for market-entry evaluators (fomo/volatility/liquidity), minutes
    #[serde(default = "default_recent_window_minutes")]
    pub recent_window_minutes: i64,
    /// Annualized volatility above which an entry counts as risk-seeking
    #[serde(default = "default_volatility_threshold")]
    pub volatility_threshold: f64,
    /// Hype score above which an entry counts as FOMO (0.0-1.0)
    #[serde(default = "default_hype_threshold")]
    pub hype_threshold: f64,
    /// Spread above which a market counts as thin (fraction of mid)
    #[serde(default = "default_max_spread")]
    pub max_spread: f64,
    /// Depth below which a market counts as thin, account currency
    #[serde(default = "default_min_depth")]
    pub min_depth: f64,
    /// Loss fraction before a held position counts as sunk-cost
    #[serde(default = "default_sunk_cost_loss_fraction")]
    pub sunk_cost_loss_fraction: f64,
    /// Hours underwater before a held position counts as sunk-cost
    #[serde(default = "default_sunk_cost_min_hours")]
    pub sunk_cost_min_hours: f64,
    /// Window after a drawdown in which new jobs count as loss chasing, minutes
    #[serde(default = "default_loss_chasing_window_minutes")]
    pub loss_chasing_window_minutes: i64,
    /// Equity drawdown fraction that arms the loss-chasing check
    #[serde(default = "default_loss_chasing_drawdown")]
    pub loss_chasing_drawdown: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Upper bound on explored combinations per rule and partition
    #[serde(default = "default_max_combinations")]
    pub max_combinations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Category reported when no pattern contributed a score
    #[serde(default = "default_fallback_category")]
    pub fallback_category: RiskCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Base URL of the market analytics service; unset disables market evaluators
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_market_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Volatility cache TTL, seconds
    #[serde(default = "default_volatility_ttl_secs")]
    pub volatility_ttl_secs: i64,
    /// Liquidity cache TTL, seconds
    #[serde(default = "default_liquidity_ttl_secs")]
    pub liquidity_ttl_secs: i64,
    /// Hype cache TTL, seconds
    #[serde(default = "default_hype_ttl_secs")]
    pub hype_ttl_secs: i64,
}

// Default value functions

fn default_queue_capacity() -> usize {
    256
}

fn default_max_concurrent_batches() -> usize {
    8
}

fn default_evaluator_timeout_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    20
}

fn default_pattern_ttl_minutes() -> i64 {
    240
}

fn default_composite_ttl_minutes() -> i64 {
    120
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_max_confidence() -> f64 {
    0.95
}

fn default_decay_half_life_minutes() -> f64 {
    60.0
}

fn default_burst_window_minutes() -> i64 {
    60
}

fn default_baseline_window_hours() -> i64 {
    24
}

fn default_min_burst_jobs() -> usize {
    4
}

fn default_recent_window_minutes() -> i64 {
    60
}

fn default_volatility_threshold() -> f64 {
    0.80 // annualized; crypto majors sit well below this in calm regimes
}

fn default_hype_threshold() -> f64 {
    0.60
}

fn default_max_spread() -> f64 {
    0.005 // 0.5% of mid
}

fn default_min_depth() -> f64 {
    25_000.0
}

fn default_sunk_cost_loss_fraction() -> f64 {
    0.05
}

fn default_sunk_cost_min_hours() -> f64 {
    12.0
}

fn default_loss_chasing_window_minutes() -> i64 {
    120
}

fn default_loss_chasing_drawdown() -> f64 {
    0.03
}

fn default_max_combinations() -> usize {
    512
}

fn default_fallback_category() -> RiskCategory {
    RiskCategory::Overtrading
}

fn default_market_timeout_secs() -> u64 {
    10
}

fn default_volatility_ttl_secs() -> i64 {
    300
}

fn default_liquidity_ttl_secs() -> i64 {
    60
}

fn default_hype_ttl_secs() -> i64 {
    120
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("SENTINEL"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.engine.queue_capacity > 0,
            "queue_capacity must be positive"
        );

        anyhow::ensure!(
            self.engine.max_concurrent_batches > 0,
            "max_concurrent_batches must be positive"
        );

        anyhow::ensure!(
            self.evaluators.max_confidence > 0.0 && self.evaluators.max_confidence <= 1.0,
            "max_confidence must be in (0, 1]"
        );

        anyhow::ensure!(
            self.composition.max_combinations > 0,
            "max_combinations must be positive"
        );

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrent_batches: default_max_concurrent_batches(),
            evaluator_timeout_secs: default_evaluator_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: default_pattern_ttl_minutes(),
            composite_ttl_minutes: default_composite_ttl_minutes(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_confidence: default_max_confidence(),
            decay_half_life_minutes: default_decay_half_life_minutes(),
            burst_window_minutes: default_burst_window_minutes(),
            baseline_window_hours: default_baseline_window_hours(),
            min_burst_jobs: default_min_burst_jobs(),
            recent_window_minutes: default_recent_window_minutes(),
            volatility_threshold: default_volatility_threshold(),
            hype_threshold: default_hype_threshold(),
            max_spread: default_max_spread(),
            min_depth: default_min_depth(),
            sunk_cost_loss_fraction: default_sunk_cost_loss_fraction(),
            sunk_cost_min_hours: default_sunk_cost_min_hours(),
            loss_chasing_window_minutes: default_loss_chasing_window_minutes(),
            loss_chasing_drawdown: default_loss_chasing_drawdown(),
        }
    }
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            max_combinations: default_max_combinations(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            fallback_category: default_fallback_category(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_market_timeout_secs(),
            volatility_ttl_secs: default_volatility_ttl_secs(),
            liquidity_ttl_secs: default_liquidity_ttl_secs(),
            hype_ttl_secs: default_hype_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }
}
