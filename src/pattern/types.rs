//! Core pattern types: risk categories, risk levels, atomic and composite patterns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Behavioral-bias grouping that patterns contribute risk scores to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Overtrading,
    Fomo,
    Overconfidence,
    LossBehavior,
    RiskSeeking,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskCategory::Overtrading => write!(f, "overtrading"),
            RiskCategory::Fomo => write!(f, "fomo"),
            RiskCategory::Overconfidence => write!(f, "overconfidence"),
            RiskCategory::LossBehavior => write!(f, "loss_behavior"),
            RiskCategory::RiskSeeking => write!(f, "risk_seeking"),
        }
    }
}

/// Risk verdict level derived from a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a confidence score to a risk level.
    ///
    /// Thresholds: >= 0.9 critical, >= 0.7 high, >= 0.5 medium, > 0 low.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            RiskLevel::Critical
        } else if confidence >= 0.7 {
            RiskLevel::High
        } else if confidence >= 0.5 {
            RiskLevel::Medium
        } else if confidence > 0.0 {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::None => write!(f, "none"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Entity scope a unique pattern is deduplicated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternScope {
    /// Pattern is tied to a set of jobs (sorted ids).
    Jobs(Vec<String>),
    /// Pattern is tied to one position.
    Position(String),
    /// Pattern applies to the user as a whole.
    Global,
}

/// Uniqueness key for a stored pattern: `(pattern_id, scope)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub pattern_id: String,
    pub scope: PatternScope,
}

/// One detected risk signal from a single evaluator check.
#[derive(Debug, Clone, Serialize)]
pub struct AtomicPattern {
    /// Unique instance id (distinct from the `pattern_id` type tag).
    pub id: String,
    /// Pattern type tag, e.g. `daily_trade_limit`.
    pub pattern_id: String,
    pub user_id: String,
    /// Jobs this signal was derived from, if any.
    pub job_ids: Option<Vec<String>>,
    /// Position this signal is tied to, if any.
    pub position_key: Option<String>,
    /// Normalized signal strength in [0, 1].
    pub severity: f64,
    /// Risk-category weights, summing to approximately 1.
    pub category_weights: HashMap<RiskCategory, f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes until the pattern stops being active. `None` never expires.
    pub ttl_minutes: Option<i64>,
    /// Whether at most one instance may be stored per `(pattern_id, scope)` key.
    pub unique: bool,
    /// Set once the pattern has been consumed by a composite match.
    pub consumed: bool,
    pub details: HashMap<String, serde_json::Value>,
}

impl AtomicPattern {
    /// Create a new atomic pattern with a single dominant category.
    pub fn new(pattern_id: &str, user_id: &str, severity: f64, category: RiskCategory) -> Self {
        let start_time = Utc::now();
        Self {
            id: instance_id(pattern_id, start_time),
            pattern_id: pattern_id.to_string(),
            user_id: user_id.to_string(),
            job_ids: None,
            position_key: None,
            severity: severity.clamp(0.0, 1.0),
            category_weights: HashMap::from([(category, 1.0)]),
            start_time,
            end_time: None,
            ttl_minutes: None,
            unique: false,
            consumed: false,
            details: HashMap::new(),
        }
    }

    /// Attach the jobs this signal was derived from.
    pub fn with_jobs(mut self, job_ids: Vec<String>) -> Self {
        self.job_ids = Some(job_ids);
        self
    }

    /// Tie the pattern to one position.
    pub fn with_position(mut self, position_key: &str) -> Self {
        self.position_key = Some(position_key.to_string());
        self
    }

    /// Override the observation window.
    pub fn with_window(mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        self.id = instance_id(&self.pattern_id, start);
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// Set the time-to-live in minutes.
    pub fn with_ttl(mut self, ttl_minutes: i64) -> Self {
        self.ttl_minutes = Some(ttl_minutes);
        self
    }

    /// Mark the pattern as unique per `(pattern_id, scope)` key.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Split category weight across multiple categories.
    pub fn with_category_weights(mut self, weights: &[(RiskCategory, f64)]) -> Self {
        self.category_weights = weights.iter().copied().collect();
        self
    }

    /// Add a free-form detail entry.
    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Effective end of the observation window.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or(self.start_time)
    }

    /// Whether the pattern is still active (TTL not yet elapsed) at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_minutes {
            None => true,
            Some(ttl) => now <= self.start_time + Duration::minutes(ttl),
        }
    }

    /// Whether the pattern's window intersects `[now - hours, now]`.
    ///
    /// Kept if it has no end time, if `[start, end]` reaches past the cutoff,
    /// or if it started at/after the cutoff.
    pub fn intersects_window(&self, now: DateTime<Utc>, hours: i64) -> bool {
        let cutoff = now - Duration::hours(hours);
        match self.end_time {
            None => true,
            Some(end) => end >= cutoff || self.start_time >= cutoff,
        }
    }

    /// Uniqueness key: `(pattern_id, sorted job_ids)` when jobs are present,
    /// else `(pattern_id, position_key)`.
    pub fn key(&self) -> PatternKey {
        let scope = match (&self.job_ids, &self.position_key) {
            (Some(jobs), _) => {
                let mut sorted = jobs.clone();
                sorted.sort();
                PatternScope::Jobs(sorted)
            }
            (None, Some(pos)) => PatternScope::Position(pos.clone()),
            (None, None) => PatternScope::Global,
        };
        PatternKey {
            pattern_id: self.pattern_id.clone(),
            scope,
        }
    }

    /// Dominant category (highest weight).
    pub fn dominant_category(&self) -> Option<RiskCategory> {
        self.category_weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(cat, _)| *cat)
    }
}

/// A higher-confidence signal formed by combining multiple atomic patterns.
#[derive(Debug, Clone, Serialize)]
pub struct CompositePattern {
    /// Unique instance id.
    pub id: String,
    /// Always `"composite_" + rule_id`.
    pub pattern_id: String,
    pub user_id: String,
    pub rule_id: String,
    /// Normalized confidence in [0, 1].
    pub confidence: f64,
    /// Instance ids of the consumed atomic components.
    pub component_patterns: Vec<String>,
    /// Dominant category mapped to weight 1.0.
    pub category_weights: HashMap<RiskCategory, f64>,
    /// Earliest component start.
    pub start_time: DateTime<Utc>,
    /// Latest component end.
    pub end_time: DateTime<Utc>,
    pub ttl_minutes: Option<i64>,
    pub is_composite: bool,
    pub message: String,
    pub details: HashMap<String, serde_json::Value>,
}

impl CompositePattern {
    /// Assemble a composite from its consumed components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: &str,
        user_id: &str,
        confidence: f64,
        category: RiskCategory,
        component_patterns: Vec<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        message: String,
    ) -> Self {
        let pattern_id = format!("composite_{}", rule_id);
        Self {
            id: instance_id(&pattern_id, Utc::now()),
            pattern_id,
            user_id: user_id.to_string(),
            rule_id: rule_id.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            component_patterns,
            category_weights: HashMap::from([(category, 1.0)]),
            start_time,
            end_time,
            ttl_minutes: None,
            is_composite: true,
            message,
            details: HashMap::new(),
        }
    }

    /// Set the time-to-live in minutes.
    pub fn with_ttl(mut self, ttl_minutes: i64) -> Self {
        self.ttl_minutes = Some(ttl_minutes);
        self
    }

    /// Add a free-form detail entry.
    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Whether the composite is still active at `now`.
    ///
    /// TTL counts from `end_time` (the latest component): a composite's
    /// lifetime is independent of how far back its earliest component reaches.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_minutes {
            None => true,
            Some(ttl) => now <= self.end_time + Duration::minutes(ttl),
        }
    }

    /// Whether the composite's window intersects `[now - hours, now]`.
    pub fn intersects_window(&self, now: DateTime<Utc>, hours: i64) -> bool {
        let cutoff = now - Duration::hours(hours);
        self.end_time >= cutoff || self.start_time >= cutoff
    }

    /// Dominant category (highest weight).
    pub fn dominant_category(&self) -> Option<RiskCategory> {
        self.category_weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(cat, _)| *cat)
    }
}

/// Timestamp-derived instance id, unique enough for in-process identity.
fn instance_id(pattern_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        pattern_id,
        at.timestamp(),
        at.timestamp_subsec_nanos()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_confidence(0.9), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_confidence(0.89999), RiskLevel::High);
        assert_eq!(RiskLevel::from_confidence(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_confidence(0.69999), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_confidence(0.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_confidence(0.01), RiskLevel::Low);
        assert_eq!(RiskLevel::from_confidence(0.0), RiskLevel::None);
    }

    #[test]
    fn test_ttl_activity() {
        let now = Utc::now();
        let pattern = AtomicPattern::new("overtrading", "user-1", 0.5, RiskCategory::Overtrading)
            .with_window(now - Duration::minutes(30), None)
            .with_ttl(20);

        assert!(!pattern.is_active_at(now));
        assert!(pattern.is_active_at(now - Duration::minutes(15)));

        let eternal = AtomicPattern::new("overtrading", "user-1", 0.5, RiskCategory::Overtrading)
            .with_window(now - Duration::days(365), None);
        assert!(eternal.is_active_at(now));
    }

    #[test]
    fn test_dedup_key_prefers_jobs_over_position() {
        let by_jobs = AtomicPattern::new("cooldown_violation", "u", 0.4, RiskCategory::Overconfidence)
            .with_jobs(vec!["j2".into(), "j1".into()])
            .with_position("pos-1");
        let by_jobs_other_order =
            AtomicPattern::new("cooldown_violation", "u", 0.4, RiskCategory::Overconfidence)
                .with_jobs(vec!["j1".into(), "j2".into()]);

        assert_eq!(by_jobs.key(), by_jobs_other_order.key());

        let by_position = AtomicPattern::new("sunk_cost_hold", "u", 0.4, RiskCategory::LossBehavior)
            .with_position("pos-1");
        assert_eq!(
            by_position.key().scope,
            PatternScope::Position("pos-1".to_string())
        );
    }

    #[test]
    fn test_window_intersection() {
        let now = Utc::now();

        // Open-ended patterns are always kept.
        let open = AtomicPattern::new("p", "u", 0.5, RiskCategory::Fomo)
            .with_window(now - Duration::hours(72), None);
        assert!(open.intersects_window(now, 24));

        // Closed window that ended before the cutoff is dropped.
        let stale = AtomicPattern::new("p", "u", 0.5, RiskCategory::Fomo).with_window(
            now - Duration::hours(72),
            Some(now - Duration::hours(48)),
        );
        assert!(!stale.intersects_window(now, 24));

        // Closed window reaching past the cutoff is kept.
        let overlapping = AtomicPattern::new("p", "u", 0.5, RiskCategory::Fomo).with_window(
            now - Duration::hours(30),
            Some(now - Duration::hours(10)),
        );
        assert!(overlapping.intersects_window(now, 24));
    }
}
