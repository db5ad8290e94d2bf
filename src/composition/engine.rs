//! The composition engine: matches rules against atomic patterns.
//!
//! Matching modes per rule:
//! - sequence: ordered chains, each next component starting at or after the
//!   running chain end, gaps bounded by the rule window
//! - set/window: combinations per required type (exact count, or greedy
//!   suffixes), all chosen components pairwise within the rule window by
//!   effective end time
//! - position-specific rules partition candidates by position key first and
//!   fire at most once per position per cycle
//!
//! Combination search is explicitly bounded to guarantee termination under
//! adversarial pattern volumes.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::config::CompositionConfig;
use crate::pattern::{AtomicPattern, CompositePattern};

use super::rule::{CompositeRule, PatternRequirement};

/// Matches an ordered list of rules against a user's atomic patterns.
pub struct CompositionEngine {
    rules: Vec<CompositeRule>,
    config: CompositionConfig,
    composite_ttl_minutes: i64,
}

impl CompositionEngine {
    /// Create an engine over an ordered rule list.
    pub fn new(
        rules: Vec<CompositeRule>,
        config: CompositionConfig,
        composite_ttl_minutes: i64,
    ) -> Self {
        Self {
            rules,
            config,
            composite_ttl_minutes,
        }
    }

    /// The configured rules, in evaluation order.
    pub fn rules(&self) -> &[CompositeRule] {
        &self.rules
    }

    /// Match all rules against the atomic pattern set.
    ///
    /// Consumed components are flagged in place; they stay in the pool and
    /// may still satisfy later rules by pattern type.
    pub fn process(
        &self,
        user_id: &str,
        atomics: &mut [AtomicPattern],
    ) -> Result<Vec<CompositePattern>> {
        self.process_at(user_id, atomics, Utc::now())
    }

    fn process_at(
        &self,
        user_id: &str,
        atomics: &mut [AtomicPattern],
        now: DateTime<Utc>,
    ) -> Result<Vec<CompositePattern>> {
        let mut composites = Vec::new();

        for rule in &self.rules {
            if rule.requirements.is_empty() {
                bail!("Rule {} has no requirements", rule.rule_id);
            }

            // Fail fast unless every required type has its minimum available.
            let counts_ok = rule.requirements.iter().all(|req| {
                req.minimum == 0
                    || atomics
                        .iter()
                        .filter(|p| p.pattern_id == req.pattern_id)
                        .count()
                        >= req.minimum
            });
            if !counts_ok {
                continue;
            }

            // Recency filter by effective end time.
            let window = Duration::minutes(rule.time_window_minutes);
            let eligible: Vec<usize> = atomics
                .iter()
                .enumerate()
                .filter(|(_, p)| now - p.effective_end() <= window)
                .map(|(i, _)| i)
                .collect();

            if rule.position_specific {
                // Patterns without a position key cannot take part in a
                // position-specific match.
                let mut partitions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
                for &i in &eligible {
                    if let Some(key) = &atomics[i].position_key {
                        partitions.entry(key.clone()).or_default().push(i);
                    }
                }
                for (position_key, indices) in partitions {
                    if let Some(selection) = self.match_rule(rule, atomics, &indices) {
                        let composite = self.build_composite(
                            rule,
                            user_id,
                            atomics,
                            &selection,
                            Some(&position_key),
                        );
                        for &i in &selection {
                            atomics[i].consumed = true;
                        }
                        composites.push(composite);
                    }
                }
            } else if let Some(selection) = self.match_rule(rule, atomics, &eligible) {
                let composite = self.build_composite(rule, user_id, atomics, &selection, None);
                for &i in &selection {
                    atomics[i].consumed = true;
                }
                composites.push(composite);
            }
        }

        if !composites.is_empty() {
            debug!(
                user_id,
                composites = composites.len(),
                "Composition produced composite patterns"
            );
        }
        Ok(composites)
    }

    /// Best-ranked valid selection for a rule within one candidate set.
    fn match_rule(
        &self,
        rule: &CompositeRule,
        atomics: &[AtomicPattern],
        candidates: &[usize],
    ) -> Option<Vec<usize>> {
        let mut by_type: HashMap<&str, Vec<usize>> = HashMap::new();
        for &i in candidates {
            by_type
                .entry(atomics[i].pattern_id.as_str())
                .or_default()
                .push(i);
        }

        // Requirement satisfaction within this candidate set.
        for req in &rule.requirements {
            let available = by_type
                .get(req.pattern_id.as_str())
                .map(Vec::len)
                .unwrap_or(0);
            if req.minimum > 0 && available < req.minimum {
                return None;
            }
        }

        let selections = if rule.sequence_matters {
            self.sequence_candidates(rule, atomics, &by_type)
        } else {
            self.window_candidates(rule, atomics, &by_type)
        };

        selections.into_iter().max_by(|a, b| {
            let ka = rank_key(atomics, a);
            let kb = rank_key(atomics, b);
            ka.0.cmp(&kb.0)
                .then(ka.1.cmp(&kb.1))
                .then(ka.2.cmp(&kb.2))
                .then(ka.3.partial_cmp(&kb.3).unwrap_or(std::cmp::Ordering::Equal))
        })
    }

    /// Ordered chains: each requirement's instances must start at or after
    /// the running chain end, with no gap wider than the rule window.
    fn sequence_candidates(
        &self,
        rule: &CompositeRule,
        atomics: &[AtomicPattern],
        by_type: &HashMap<&str, Vec<usize>>,
    ) -> Vec<Vec<usize>> {
        // Optional non-greedy requirements impose no sequence constraint.
        let ordered: Vec<&PatternRequirement> = rule
            .requirements
            .iter()
            .filter(|r| r.minimum > 0 || r.greedy)
            .collect();
        let first_req = match ordered.first() {
            Some(req) => *req,
            None => return Vec::new(),
        };

        let window = Duration::minutes(rule.time_window_minutes);
        let sorted_of = |pattern_id: &str| -> Vec<usize> {
            let mut instances = by_type.get(pattern_id).cloned().unwrap_or_default();
            instances.sort_by_key(|&i| atomics[i].start_time);
            instances
        };

        let mut candidates = Vec::new();
        for &start_idx in &sorted_of(&first_req.pattern_id) {
            if candidates.len() >= self.config.max_combinations {
                warn!(
                    rule_id = %rule.rule_id,
                    "Sequence search hit the combination bound"
                );
                break;
            }

            let mut chosen: Vec<usize> = Vec::new();
            let mut chain_end = atomics[start_idx].start_time;
            let mut valid = true;

            for (req_pos, req) in ordered.iter().enumerate() {
                let needed = if req_pos == 0 {
                    req.minimum.max(1)
                } else {
                    req.minimum
                };
                let mut taken = 0;

                for idx in sorted_of(&req.pattern_id) {
                    if req_pos == 0 && taken == 0 && idx != start_idx {
                        continue;
                    }
                    if chosen.contains(&idx) || atomics[idx].start_time < chain_end {
                        continue;
                    }
                    let gap = atomics[idx].start_time - chain_end;
                    if gap > window {
                        // The nearest following instance is already too far.
                        if taken < needed {
                            valid = false;
                        }
                        break;
                    }
                    chosen.push(idx);
                    chain_end = chain_end.max(atomics[idx].effective_end());
                    taken += 1;
                    if taken >= needed && !req.greedy {
                        break;
                    }
                }

                if !valid || taken < needed {
                    valid = false;
                    break;
                }
            }

            if valid && !chosen.is_empty() {
                candidates.push(chosen);
            }
        }
        candidates
    }

    /// Set/window semantics: per-type combinations (exact count, or greedy
    /// suffixes) whose members are pairwise within the rule window by
    /// effective end time. Optional requirements are explored both included
    /// and excluded, larger combinations first.
    fn window_candidates(
        &self,
        rule: &CompositeRule,
        atomics: &[AtomicPattern],
        by_type: &HashMap<&str, Vec<usize>>,
    ) -> Vec<Vec<usize>> {
        let cap = self.config.max_combinations;
        let mut per_type: Vec<Vec<Vec<usize>>> = Vec::with_capacity(rule.requirements.len());

        for req in &rule.requirements {
            let mut instances = by_type
                .get(req.pattern_id.as_str())
                .cloned()
                .unwrap_or_default();
            instances.sort_by_key(|&i| atomics[i].effective_end());

            let mut options: Vec<Vec<usize>> = Vec::new();
            if req.greedy {
                // "Take all from a starting index": longest suffixes first.
                for start in 0..instances.len() {
                    let suffix = instances[start..].to_vec();
                    if suffix.len() >= req.minimum.max(1) {
                        options.push(suffix);
                    }
                    if options.len() >= cap {
                        break;
                    }
                }
                if req.minimum == 0 {
                    options.push(Vec::new());
                }
            } else if req.minimum == 0 {
                // Optional: each single instance, then excluded.
                for &idx in &instances {
                    options.push(vec![idx]);
                    if options.len() >= cap {
                        break;
                    }
                }
                options.push(Vec::new());
            } else {
                options = combinations_capped(&instances, req.minimum, cap);
            }

            if options.is_empty() {
                return Vec::new();
            }
            per_type.push(options);
        }

        // Cartesian product across requirement types, bounded.
        let window = Duration::minutes(rule.time_window_minutes);
        let mut candidates = Vec::new();
        let mut cursor = vec![0usize; per_type.len()];
        let mut explored = 0usize;

        'product: loop {
            explored += 1;
            if explored > cap {
                warn!(
                    rule_id = %rule.rule_id,
                    bound = cap,
                    "Window search hit the combination bound"
                );
                break;
            }

            let selection: Vec<usize> = cursor
                .iter()
                .enumerate()
                .flat_map(|(t, &o)| per_type[t][o].iter().copied())
                .collect();
            if !selection.is_empty() && pairwise_within(atomics, &selection, window) {
                candidates.push(selection);
            }

            // Advance the mixed-radix cursor.
            for t in (0..cursor.len()).rev() {
                cursor[t] += 1;
                if cursor[t] < per_type[t].len() {
                    continue 'product;
                }
                cursor[t] = 0;
            }
            break;
        }
        candidates
    }

    fn build_composite(
        &self,
        rule: &CompositeRule,
        user_id: &str,
        atomics: &[AtomicPattern],
        selection: &[usize],
        position_key: Option<&str>,
    ) -> CompositePattern {
        let components: Vec<&AtomicPattern> = selection.iter().map(|&i| &atomics[i]).collect();

        let start_time = components
            .iter()
            .map(|p| p.start_time)
            .min()
            .unwrap_or_else(Utc::now);
        let end_time = components
            .iter()
            .map(|p| p.effective_end())
            .max()
            .unwrap_or(start_time);

        // Aggregation-weighted confidence: component severities weighted by
        // their weight for the rule category (1.0 when absent).
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for component in &components {
            let weight = component
                .category_weights
                .get(&rule.category)
                .copied()
                .unwrap_or(1.0);
            weighted += component.severity * weight;
            weight_sum += weight;
        }
        let confidence = if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            0.0
        };

        let component_details: Vec<serde_json::Value> = components
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "pattern_id": p.pattern_id,
                    "severity": p.severity,
                })
            })
            .collect();

        let mut composite = CompositePattern::new(
            &rule.rule_id,
            user_id,
            confidence,
            rule.category,
            components.iter().map(|p| p.id.clone()).collect(),
            start_time,
            end_time,
            rule.message.clone(),
        )
        .with_ttl(self.composite_ttl_minutes)
        .with_detail("components", json!(component_details))
        .with_detail("span_minutes", json!((end_time - start_time).num_minutes()))
        .with_detail("sequence", json!(rule.sequence_matters))
        .with_detail("position_specific", json!(rule.position_specific));

        if let Some(key) = position_key {
            composite = composite.with_detail("position_key", json!(key));
        }
        composite
    }
}

/// Ranking key for candidate selections: distinct pattern types, most recent
/// effective end, selection size, mean severity — all descending.
fn rank_key(
    atomics: &[AtomicPattern],
    selection: &[usize],
) -> (usize, DateTime<Utc>, usize, f64) {
    let mut types: Vec<&str> = selection
        .iter()
        .map(|&i| atomics[i].pattern_id.as_str())
        .collect();
    types.sort_unstable();
    types.dedup();

    let latest_end = selection
        .iter()
        .map(|&i| atomics[i].effective_end())
        .max()
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);
    let mean_severity = if selection.is_empty() {
        0.0
    } else {
        selection.iter().map(|&i| atomics[i].severity).sum::<f64>() / selection.len() as f64
    };

    (types.len(), latest_end, selection.len(), mean_severity)
}

/// Whether every pair of chosen patterns is within `window` of each other by
/// effective end time.
fn pairwise_within(atomics: &[AtomicPattern], selection: &[usize], window: Duration) -> bool {
    let ends: Vec<DateTime<Utc>> = selection.iter().map(|&i| atomics[i].effective_end()).collect();
    match (ends.iter().min(), ends.iter().max()) {
        (Some(min), Some(max)) => *max - *min <= window,
        _ => true,
    }
}

/// All `k`-combinations of `items`, capped at `cap` results.
fn combinations_capped(items: &[usize], k: usize, cap: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let mut results = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();

    loop {
        results.push(indices.iter().map(|&i| items[i]).collect());
        if results.len() >= cap {
            break;
        }

        // Advance the combination index vector.
        let mut pos = k;
        while pos > 0 {
            pos -= 1;
            if indices[pos] != pos + items.len() - k {
                indices[pos] += 1;
                for later in pos + 1..k {
                    indices[later] = indices[later - 1] + 1;
                }
                break;
            }
            if pos == 0 {
                return results;
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RiskCategory;
    use chrono::Duration;

    fn atomic(
        pattern_id: &str,
        severity: f64,
        minutes_ago: i64,
        now: DateTime<Utc>,
    ) -> AtomicPattern {
        AtomicPattern::new(pattern_id, "user-1", severity, RiskCategory::Overconfidence)
            .with_window(now - Duration::minutes(minutes_ago), None)
    }

    fn engine(rules: Vec<CompositeRule>) -> CompositionEngine {
        CompositionEngine::new(rules, CompositionConfig::default(), 120)
    }

    #[test]
    fn test_missing_required_type_produces_nothing() {
        let now = Utc::now();
        let rule = CompositeRule::new("both", RiskCategory::Overconfidence, 1440, "msg")
            .require("daily_trade_limit", 1)
            .require("cooldown_violation", 1);

        let mut atomics = vec![atomic("daily_trade_limit", 0.6, 10, now)];
        let composites = engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .unwrap();

        assert!(composites.is_empty());
        assert!(!atomics[0].consumed);
    }

    #[test]
    fn test_two_required_types_compose_and_consume() {
        let now = Utc::now();
        let rule = CompositeRule::new(
            "discipline_breakdown",
            RiskCategory::Overconfidence,
            1440,
            "Limits and cooldowns breached together",
        )
        .require("daily_trade_limit", 1)
        .require("cooldown_violation", 1);

        let mut atomics = vec![
            atomic("daily_trade_limit", 0.6, 20, now),
            atomic("cooldown_violation", 0.7, 10, now),
        ];
        let composites = engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .unwrap();

        assert_eq!(composites.len(), 1);
        let composite = &composites[0];
        assert_eq!(composite.pattern_id, "composite_discipline_breakdown");
        assert_eq!(composite.component_patterns.len(), 2);
        assert_eq!(composite.dominant_category(), Some(RiskCategory::Overconfidence));
        // Weighted mean of 0.6 and 0.7 at equal weight.
        assert!((composite.confidence - 0.65).abs() < 1e-9);
        assert!(atomics.iter().all(|p| p.consumed));
        // Span covers both components.
        assert_eq!(composite.start_time, atomics[0].start_time);
        assert_eq!(composite.end_time, atomics[1].start_time);
    }

    #[test]
    fn test_sequence_order_enforced() {
        let now = Utc::now();
        let rule = || {
            CompositeRule::new("spiral", RiskCategory::Fomo, 30, "msg")
                .require("fomo_entry", 1)
                .require("overtrading", 1)
                .sequenced()
        };

        // A before B: satisfied.
        let mut forward = vec![
            atomic("fomo_entry", 0.5, 20, now),
            atomic("overtrading", 0.5, 10, now),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut forward, now)
            .unwrap();
        assert_eq!(composites.len(), 1);

        // B before A: rejected.
        let mut backward = vec![
            atomic("fomo_entry", 0.5, 10, now),
            atomic("overtrading", 0.5, 20, now),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut backward, now)
            .unwrap();
        assert!(composites.is_empty());
    }

    #[test]
    fn test_sequence_with_repeated_type_count() {
        let now = Utc::now();
        let rule = || {
            CompositeRule::new("spiral", RiskCategory::Fomo, 60, "msg")
                .require("fomo_entry", 2)
                .require("overtrading", 1)
                .sequenced()
        };

        // Two fomo entries before the burst: a full chain.
        let mut atomics = vec![
            atomic("fomo_entry", 0.5, 30, now),
            atomic("fomo_entry", 0.5, 20, now),
            atomic("overtrading", 0.5, 10, now),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut atomics, now)
            .unwrap();
        assert_eq!(composites.len(), 1);
        assert_eq!(composites[0].component_patterns.len(), 3);

        // Only one fomo entry available before the burst: no chain.
        let mut short = vec![
            atomic("fomo_entry", 0.5, 30, now),
            atomic("overtrading", 0.5, 10, now),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut short, now)
            .unwrap();
        assert!(composites.is_empty());
    }

    #[test]
    fn test_position_isolation() {
        let now = Utc::now();
        let rule = || {
            CompositeRule::new("doubling", RiskCategory::LossBehavior, 240, "msg")
                .require("sunk_cost_hold", 1)
                .require("loss_chasing", 1)
                .per_position()
        };

        // Requirements satisfied only across different positions: no match.
        let mut split = vec![
            atomic("sunk_cost_hold", 0.5, 30, now).with_position("pos-1"),
            atomic("loss_chasing", 0.5, 10, now).with_position("pos-2"),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut split, now)
            .unwrap();
        assert!(composites.is_empty());

        // Same position: fires once, tagged with the position key.
        let mut same = vec![
            atomic("sunk_cost_hold", 0.5, 30, now).with_position("pos-1"),
            atomic("loss_chasing", 0.5, 10, now).with_position("pos-1"),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut same, now)
            .unwrap();
        assert_eq!(composites.len(), 1);
        assert_eq!(
            composites[0].details.get("position_key"),
            Some(&json!("pos-1"))
        );
    }

    #[test]
    fn test_position_rule_fires_per_position() {
        let now = Utc::now();
        let rule = CompositeRule::new("doubling", RiskCategory::LossBehavior, 240, "msg")
            .require("sunk_cost_hold", 1)
            .require("loss_chasing", 1)
            .per_position();

        let mut atomics = vec![
            atomic("sunk_cost_hold", 0.5, 30, now).with_position("pos-1"),
            atomic("loss_chasing", 0.5, 10, now).with_position("pos-1"),
            atomic("sunk_cost_hold", 0.5, 35, now).with_position("pos-2"),
            atomic("loss_chasing", 0.5, 12, now).with_position("pos-2"),
        ];
        let composites = engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .unwrap();
        assert_eq!(composites.len(), 2);
    }

    #[test]
    fn test_greedy_requirement_absorbs_all() {
        let now = Utc::now();
        let rule = CompositeRule::new("escalation", RiskCategory::RiskSeeking, 240, "msg")
            .require_greedy("high_volatility_entry", 2);

        let mut atomics = vec![
            atomic("high_volatility_entry", 0.5, 30, now),
            atomic("high_volatility_entry", 0.6, 20, now),
            atomic("high_volatility_entry", 0.7, 10, now),
        ];
        let composites = engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .unwrap();

        assert_eq!(composites.len(), 1);
        assert_eq!(composites[0].component_patterns.len(), 3);
    }

    #[test]
    fn test_optional_requirement_included_when_available() {
        let now = Utc::now();
        let rule = || {
            CompositeRule::new("escalation", RiskCategory::RiskSeeking, 240, "msg")
                .require("high_volatility_entry", 1)
                .optional("thin_liquidity_entry")
        };

        // Optional present: the larger, two-type combination wins.
        let mut with_optional = vec![
            atomic("high_volatility_entry", 0.5, 20, now),
            atomic("thin_liquidity_entry", 0.4, 10, now),
        ];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut with_optional, now)
            .unwrap();
        assert_eq!(composites.len(), 1);
        assert_eq!(composites[0].component_patterns.len(), 2);

        // Optional absent: still fires on the required type alone.
        let mut without = vec![atomic("high_volatility_entry", 0.5, 20, now)];
        let composites = engine(vec![rule()])
            .process_at("user-1", &mut without, now)
            .unwrap();
        assert_eq!(composites.len(), 1);
        assert_eq!(composites[0].component_patterns.len(), 1);
    }

    #[test]
    fn test_best_candidate_prefers_recent_end() {
        let now = Utc::now();
        let rule = CompositeRule::new("single", RiskCategory::Overconfidence, 1440, "msg")
            .require("daily_trade_limit", 1);

        let mut atomics = vec![
            atomic("daily_trade_limit", 0.9, 300, now),
            atomic("daily_trade_limit", 0.2, 5, now),
        ];
        let composites = engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .unwrap();

        assert_eq!(composites.len(), 1);
        // Recency outranks severity in the candidate ordering.
        assert!(atomics[1].consumed);
        assert!(!atomics[0].consumed);
    }

    #[test]
    fn test_stale_patterns_not_eligible() {
        let now = Utc::now();
        let rule = CompositeRule::new("both", RiskCategory::Overconfidence, 60, "msg")
            .require("daily_trade_limit", 1)
            .require("cooldown_violation", 1);

        let mut atomics = vec![
            atomic("daily_trade_limit", 0.6, 600, now), // far outside the window
            atomic("cooldown_violation", 0.7, 10, now),
        ];
        let composites = engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .unwrap();
        assert!(composites.is_empty());
    }

    #[test]
    fn test_combination_bound_terminates() {
        let now = Utc::now();
        let rule = CompositeRule::new("bounded", RiskCategory::Overconfidence, 1440, "msg")
            .require("cooldown_violation", 2);

        let mut atomics: Vec<AtomicPattern> = (0..40)
            .map(|i| atomic("cooldown_violation", 0.5, i, now))
            .collect();

        let engine = CompositionEngine::new(
            vec![rule],
            CompositionConfig {
                max_combinations: 10,
            },
            120,
        );
        let composites = engine.process_at("user-1", &mut atomics, now).unwrap();
        // Bounded search still yields the single best composite it found.
        assert_eq!(composites.len(), 1);
        assert_eq!(composites[0].component_patterns.len(), 2);
    }

    #[test]
    fn test_consumed_atomics_still_satisfy_other_rules() {
        let now = Utc::now();
        let first = CompositeRule::new("first", RiskCategory::Overconfidence, 1440, "msg")
            .require("daily_trade_limit", 1);
        let second = CompositeRule::new("second", RiskCategory::Overconfidence, 1440, "msg")
            .require("daily_trade_limit", 1)
            .require("cooldown_violation", 1);

        let mut atomics = vec![
            atomic("daily_trade_limit", 0.6, 20, now),
            atomic("cooldown_violation", 0.7, 10, now),
        ];
        let composites = engine(vec![first, second])
            .process_at("user-1", &mut atomics, now)
            .unwrap();

        // The first rule consumes the daily_trade_limit pattern, but the
        // second still matches it by type.
        assert_eq!(composites.len(), 2);
    }

    #[test]
    fn test_empty_requirements_is_an_error() {
        let now = Utc::now();
        let rule = CompositeRule::new("broken", RiskCategory::Fomo, 60, "msg");
        let mut atomics = vec![atomic("fomo_entry", 0.5, 10, now)];
        assert!(engine(vec![rule])
            .process_at("user-1", &mut atomics, now)
            .is_err());
    }
}
