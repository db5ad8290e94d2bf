//! Aggregation of patterns into a single risk verdict.
//!
//! Composite patterns contribute at full strength; unconsumed atomic
//! patterns count at half strength as awareness signals. Category scores are
//! arithmetic means of their contributions, which bounds inflation from many
//! small signals.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::AggregationConfig;
use crate::pattern::{AtomicPattern, CompositePattern, RiskCategory, RiskLevel};

/// Whether the verdict was driven by a composite match or atomics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Composite,
    Atomic,
}

/// Compact view of an unconsumed signal, for report observability.
#[derive(Debug, Clone, Serialize)]
pub struct SignalSummary {
    pub pattern_id: String,
    pub severity: f64,
}

/// The aggregated risk verdict for one user, published once per cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub top_risk_level: RiskLevel,
    pub top_risk_confidence: f64,
    pub top_risk_type: RiskCategory,
    pub category_scores: HashMap<RiskCategory, f64>,
    pub patterns: Vec<AtomicPattern>,
    pub composite_patterns: Vec<CompositePattern>,
    pub pattern_count: usize,
    pub composite_count: usize,
    pub consumed_count: usize,
    pub unconsumed_count: usize,
    pub signal_source: SignalSource,
    pub sample_signals: Vec<SignalSummary>,
}

/// Turns a pattern set into per-category scores and a dominant risk verdict.
pub struct RiskAggregator {
    config: AggregationConfig,
}

impl RiskAggregator {
    /// Create an aggregator.
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Aggregate the full pattern set into a risk report.
    pub fn aggregate(
        &self,
        atomics: &[AtomicPattern],
        composites: &[CompositePattern],
        user_id: &str,
    ) -> RiskReport {
        let mut contributions: HashMap<RiskCategory, Vec<f64>> = HashMap::new();

        for composite in composites {
            for (category, weight) in &composite.category_weights {
                contributions
                    .entry(*category)
                    .or_default()
                    .push(composite.confidence * weight);
            }
        }

        // Atomic awareness signals count at half strength, and only while
        // unconsumed; consumed atomics are already represented by their
        // composite.
        for atomic in atomics.iter().filter(|p| !p.consumed) {
            for (category, weight) in &atomic.category_weights {
                contributions
                    .entry(*category)
                    .or_default()
                    .push(atomic.severity * weight * 0.5);
            }
        }

        let mut category_scores: HashMap<RiskCategory, f64> = HashMap::new();
        for (category, values) in &contributions {
            if !values.is_empty() {
                category_scores
                    .insert(*category, values.iter().sum::<f64>() / values.len() as f64);
            }
        }

        // Deterministic winner: sorted category order breaks score ties.
        let mut ranked: Vec<(&RiskCategory, &f64)> = category_scores.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(b.0))
        });

        let (top_risk_type, top_risk_confidence) = ranked
            .first()
            .map(|(category, score)| (**category, **score))
            .unwrap_or((self.config.fallback_category, 0.0));
        let top_risk_level = RiskLevel::from_confidence(top_risk_confidence);

        let consumed_count = atomics.iter().filter(|p| p.consumed).count();
        let unconsumed_count = atomics.len() - consumed_count;
        let signal_source = if composites.is_empty() {
            SignalSource::Atomic
        } else {
            SignalSource::Composite
        };

        let sample_signals = atomics
            .iter()
            .filter(|p| !p.consumed)
            .take(5)
            .map(|p| SignalSummary {
                pattern_id: p.pattern_id.clone(),
                severity: p.severity,
            })
            .collect();

        debug!(
            user_id,
            level = %top_risk_level,
            category = %top_risk_type,
            confidence = top_risk_confidence,
            "Aggregated risk verdict"
        );

        RiskReport {
            user_id: user_id.to_string(),
            generated_at: Utc::now(),
            top_risk_level,
            top_risk_confidence,
            top_risk_type,
            category_scores,
            patterns: atomics.to_vec(),
            composite_patterns: composites.to_vec(),
            pattern_count: atomics.len(),
            composite_count: composites.len(),
            consumed_count,
            unconsumed_count,
            signal_source,
            sample_signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn aggregator() -> RiskAggregator {
        RiskAggregator::new(AggregationConfig::default())
    }

    fn atomic(pattern_id: &str, severity: f64, category: RiskCategory) -> AtomicPattern {
        AtomicPattern::new(pattern_id, "user-1", severity, category)
    }

    fn composite(confidence: f64, category: RiskCategory) -> CompositePattern {
        let now = Utc::now();
        CompositePattern::new(
            "rule",
            "user-1",
            confidence,
            category,
            vec!["c1".to_string()],
            now - Duration::minutes(10),
            now,
            "msg".to_string(),
        )
    }

    #[test]
    fn test_atomic_mean_arithmetic() {
        // Two unconsumed atomics at 0.8 and 0.4, weight 1.0, same category:
        // (0.8*0.5 + 0.4*0.5) / 2 = 0.3
        let atomics = vec![
            atomic("a", 0.8, RiskCategory::Overtrading),
            atomic("b", 0.4, RiskCategory::Overtrading),
        ];
        let report = aggregator().aggregate(&atomics, &[], "user-1");

        let score = report.category_scores[&RiskCategory::Overtrading];
        assert!((score - 0.3).abs() < 1e-9);
        assert_eq!(report.top_risk_type, RiskCategory::Overtrading);
        assert_eq!(report.top_risk_level, RiskLevel::Low);
        assert_eq!(report.signal_source, SignalSource::Atomic);
    }

    #[test]
    fn test_consumed_atomics_do_not_contribute() {
        let mut consumed = atomic("a", 0.8, RiskCategory::Fomo);
        consumed.consumed = true;
        let atomics = vec![consumed, atomic("b", 0.4, RiskCategory::Fomo)];

        let report = aggregator().aggregate(&atomics, &[], "user-1");
        let score = report.category_scores[&RiskCategory::Fomo];
        assert!((score - 0.2).abs() < 1e-9);
        assert_eq!(report.consumed_count, 1);
        assert_eq!(report.unconsumed_count, 1);
    }

    #[test]
    fn test_composites_count_at_full_strength() {
        let composites = vec![composite(0.9, RiskCategory::Overconfidence)];
        let report = aggregator().aggregate(&[], &composites, "user-1");

        let score = report.category_scores[&RiskCategory::Overconfidence];
        assert!((score - 0.9).abs() < 1e-9);
        assert_eq!(report.top_risk_level, RiskLevel::Critical);
        assert_eq!(report.signal_source, SignalSource::Composite);
    }

    #[test]
    fn test_empty_input_falls_back() {
        let report = aggregator().aggregate(&[], &[], "user-1");
        assert_eq!(report.top_risk_level, RiskLevel::None);
        assert_eq!(report.top_risk_confidence, 0.0);
        assert_eq!(report.top_risk_type, AggregationConfig::default().fallback_category);
        assert!(report.category_scores.is_empty());
    }

    #[test]
    fn test_top_category_wins_across_categories() {
        let atomics = vec![
            atomic("a", 0.9, RiskCategory::Fomo),
            atomic("b", 0.2, RiskCategory::Overtrading),
        ];
        let composites = vec![composite(0.8, RiskCategory::LossBehavior)];
        let report = aggregator().aggregate(&atomics, &composites, "user-1");

        // LossBehavior: 0.8 beats Fomo's 0.45 and Overtrading's 0.1.
        assert_eq!(report.top_risk_type, RiskCategory::LossBehavior);
        assert_eq!(report.top_risk_level, RiskLevel::High);
    }

    #[test]
    fn test_sample_signals_capped_at_five() {
        let atomics: Vec<AtomicPattern> = (0..8)
            .map(|i| atomic(&format!("p{}", i), 0.5, RiskCategory::Overtrading))
            .collect();
        let report = aggregator().aggregate(&atomics, &[], "user-1");
        assert_eq!(report.sample_signals.len(), 5);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = aggregator().aggregate(
            &[atomic("a", 0.8, RiskCategory::Fomo)],
            &[composite(0.9, RiskCategory::Fomo)],
            "user-1",
        );
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["top_risk_type"], "fomo");
        // Mean of the 0.9 composite and the half-weighted 0.8 atomic.
        assert_eq!(json["top_risk_level"], "high");
        assert!(json["category_scores"].is_object());
        assert!(json["patterns"].is_array());
        assert!(json["composite_patterns"].is_array());
    }
}
