//! Default composite rule set.

use crate::pattern::RiskCategory;

use super::rule::CompositeRule;

/// The built-in rules, in evaluation order.
pub fn default_rules() -> Vec<CompositeRule> {
    vec![
        // Limit breaches stacking up inside one day read as overconfidence,
        // not isolated slips.
        CompositeRule::new(
            "discipline_breakdown",
            RiskCategory::Overconfidence,
            1440,
            "Daily trade limit and cooldown both breached within a day",
        )
        .require("daily_trade_limit", 1)
        .require("cooldown_violation", 1),
        // A hyped entry followed by a trading burst: the classic FOMO spiral.
        CompositeRule::new(
            "fomo_spiral",
            RiskCategory::Fomo,
            180,
            "Hyped entry escalated into a trading burst",
        )
        .require("fomo_entry", 1)
        .require("overtrading", 1)
        .sequenced(),
        // Adding to an underwater position that is already a sunk-cost hold.
        CompositeRule::new(
            "sunk_cost_doubling",
            RiskCategory::LossBehavior,
            240,
            "New orders added to a position already held at a loss",
        )
        .require("sunk_cost_hold", 1)
        .require("loss_chasing", 1)
        .per_position(),
        // Repeated entries into volatile markets, worse if they are thin too.
        CompositeRule::new(
            "risk_escalation",
            RiskCategory::RiskSeeking,
            240,
            "Repeated entries into volatile or thin markets",
        )
        .require_greedy("high_volatility_entry", 2)
        .optional("thin_liquidity_entry"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_well_formed() {
        let rules = default_rules();
        assert!(!rules.is_empty());
        for rule in &rules {
            assert!(!rule.requirements.is_empty());
            assert!(rule.time_window_minutes > 0);
            assert!(rule
                .requirements
                .iter()
                .any(|r| r.minimum > 0 || r.greedy));
        }
    }
}
