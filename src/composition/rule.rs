//! Declarative composite-pattern rules.

use serde::{Deserialize, Serialize};

use crate::pattern::RiskCategory;

/// One required pattern type within a rule.
///
/// `minimum` is the instance count needed for the rule to fire; zero marks
/// the requirement optional. `greedy` requirements absorb every matching
/// instance instead of an exact count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRequirement {
    pub pattern_id: String,
    pub minimum: usize,
    pub greedy: bool,
}

/// A declarative rule composing atomic patterns into a composite signal.
///
/// Requirement order is significant when `sequence_matters` is set: chains
/// must observe the requirements in listed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRule {
    pub rule_id: String,
    pub requirements: Vec<PatternRequirement>,
    pub category: RiskCategory,
    pub time_window_minutes: i64,
    pub sequence_matters: bool,
    pub position_specific: bool,
    pub message: String,
}

impl CompositeRule {
    /// Start a rule with no requirements.
    pub fn new(
        rule_id: &str,
        category: RiskCategory,
        time_window_minutes: i64,
        message: &str,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            requirements: Vec::new(),
            category,
            time_window_minutes,
            sequence_matters: false,
            position_specific: false,
            message: message.to_string(),
        }
    }

    /// Require exactly `minimum` instances of a pattern type.
    pub fn require(mut self, pattern_id: &str, minimum: usize) -> Self {
        self.requirements.push(PatternRequirement {
            pattern_id: pattern_id.to_string(),
            minimum,
            greedy: false,
        });
        self
    }

    /// Require at least `minimum` instances and absorb all available.
    pub fn require_greedy(mut self, pattern_id: &str, minimum: usize) -> Self {
        self.requirements.push(PatternRequirement {
            pattern_id: pattern_id.to_string(),
            minimum,
            greedy: true,
        });
        self
    }

    /// Add an optional requirement (minimum zero), explored both ways.
    pub fn optional(mut self, pattern_id: &str) -> Self {
        self.requirements.push(PatternRequirement {
            pattern_id: pattern_id.to_string(),
            minimum: 0,
            greedy: false,
        });
        self
    }

    /// Components must occur in requirement order.
    pub fn sequenced(mut self) -> Self {
        self.sequence_matters = true;
        self
    }

    /// Match independently per position; never across positions.
    pub fn per_position(mut self) -> Self {
        self.position_specific = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_requirement_order() {
        let rule = CompositeRule::new("r", RiskCategory::Fomo, 60, "msg")
            .require("a", 1)
            .require_greedy("b", 2)
            .optional("c")
            .sequenced();

        assert!(rule.sequence_matters);
        assert!(!rule.position_specific);
        assert_eq!(
            rule.requirements
                .iter()
                .map(|r| r.pattern_id.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert!(rule.requirements[1].greedy);
        assert_eq!(rule.requirements[2].minimum, 0);
    }
}
