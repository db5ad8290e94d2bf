//! Pluggable risk evaluators.
//!
//! Each evaluator inspects one user's activity state and returns zero or
//! more atomic patterns. Evaluators share one uniform async contract at the
//! worker-pool boundary; synchronous checks simply never await. A failing
//! evaluator is isolated by the orchestrator and scored as an empty result.

pub mod math;

mod fomo;
mod limits;
mod loss_behavior;
mod overtrading;
mod risk_seeking;

pub use fomo::FomoEvaluator;
pub use limits::{
    ConcurrencyLimitEvaluator, CooldownEvaluator, DailyTradeLimitEvaluator,
    OversizedTradeEvaluator, VolumeLimitEvaluator,
};
pub use loss_behavior::{LossChasingEvaluator, SunkCostEvaluator};
pub use overtrading::OvertradingEvaluator;
pub use risk_seeking::{ThinLiquidityEvaluator, VolatilityEntryEvaluator};

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::pattern::AtomicPattern;

/// A pluggable risk check over one user's activity state.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Stable evaluator id used in presets and work requests.
    fn id(&self) -> &'static str;

    /// Inspect the user's state and return detected atomic patterns.
    async fn evaluate(&self, user_id: &str) -> Result<Vec<AtomicPattern>>;
}

/// Named subset of evaluators to run together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Default,
    PositionsOnly,
    LimitsOnly,
    All,
}

const LIMIT_IDS: &[&str] = &[
    "oversized_trade",
    "daily_trade_limit",
    "volume_limit",
    "cooldown_violation",
    "concurrency_limit",
];

const POSITION_IDS: &[&str] = &["sunk_cost_hold", "loss_chasing", "concurrency_limit"];

const DEFAULT_IDS: &[&str] = &[
    "oversized_trade",
    "daily_trade_limit",
    "volume_limit",
    "cooldown_violation",
    "concurrency_limit",
    "overtrading",
    "sunk_cost_hold",
    "loss_chasing",
];

const ALL_IDS: &[&str] = &[
    "oversized_trade",
    "daily_trade_limit",
    "volume_limit",
    "cooldown_violation",
    "concurrency_limit",
    "overtrading",
    "fomo_entry",
    "high_volatility_entry",
    "thin_liquidity_entry",
    "sunk_cost_hold",
    "loss_chasing",
];

impl Preset {
    /// Evaluator ids the preset maps to.
    pub fn ids(&self) -> &'static [&'static str] {
        match self {
            Preset::Default => DEFAULT_IDS,
            Preset::PositionsOnly => POSITION_IDS,
            Preset::LimitsOnly => LIMIT_IDS,
            Preset::All => ALL_IDS,
        }
    }

    /// Parse a preset name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Preset::Default),
            "positions_only" => Some(Preset::PositionsOnly),
            "limits_only" => Some(Preset::LimitsOnly),
            "all" => Some(Preset::All),
            _ => None,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Default => write!(f, "default"),
            Preset::PositionsOnly => write!(f, "positions_only"),
            Preset::LimitsOnly => write!(f, "limits_only"),
            Preset::All => write!(f, "all"),
        }
    }
}

/// Which evaluators a work request should run.
#[derive(Debug, Clone)]
pub enum EvaluatorSelection {
    Preset(Preset),
    Ids(Vec<String>),
}

impl EvaluatorSelection {
    /// Resolve to concrete evaluator ids.
    pub fn ids(&self) -> Vec<String> {
        match self {
            EvaluatorSelection::Preset(preset) => {
                preset.ids().iter().map(|s| s.to_string()).collect()
            }
            EvaluatorSelection::Ids(ids) => ids.clone(),
        }
    }
}

/// Registry of evaluators keyed by id.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<&'static str, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an evaluator under its id. Re-registering replaces.
    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.evaluators.insert(evaluator.id(), evaluator);
    }

    /// Resolve a list of evaluator ids, dropping (and logging) unknown ones.
    pub fn resolve(&self, ids: &[String]) -> Vec<Arc<dyn Evaluator>> {
        ids.iter()
            .filter_map(|id| {
                let found = self.evaluators.get(id.as_str()).cloned();
                if found.is_none() {
                    warn!(evaluator_id = %id, "Unknown evaluator id requested");
                }
                found
            })
            .collect()
    }

    /// All registered evaluator ids.
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.evaluators.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopEvaluator;

    #[async_trait]
    impl Evaluator for NoopEvaluator {
        fn id(&self) -> &'static str {
            "noop"
        }

        async fn evaluate(&self, _user_id: &str) -> Result<Vec<AtomicPattern>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!(Preset::parse("positions_only"), Some(Preset::PositionsOnly));
        assert_eq!(Preset::parse("bogus"), None);
        assert!(Preset::All.ids().contains(&"fomo_entry"));
        assert!(!Preset::LimitsOnly.ids().contains(&"overtrading"));
    }

    #[test]
    fn test_registry_resolve_drops_unknown() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(Arc::new(NoopEvaluator));

        let resolved = registry.resolve(&["noop".to_string(), "missing".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id(), "noop");
    }
}
