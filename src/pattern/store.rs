//! Per-user pattern storage with uniqueness and TTL eviction.
//!
//! The store is additive: storing a batch never overwrites unrelated
//! patterns, only same-key unique instances. All operations run under one
//! mutual-exclusion lock per store instance; lookups for unknown users
//! return empty results.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, trace};

use super::types::{AtomicPattern, CompositePattern, PatternKey};

#[derive(Debug, Default)]
struct UserPatterns {
    atomics: Vec<AtomicPattern>,
    composites: Vec<CompositePattern>,
}

/// Concurrency-safe store of atomic and composite patterns keyed by user.
#[derive(Debug, Default)]
pub struct PatternStore {
    inner: Mutex<HashMap<String, UserPatterns>>,
}

impl PatternStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a batch of atomic patterns for a user.
    ///
    /// Unique patterns replace any stored instance sharing their
    /// `(pattern_id, scope)` key; among colliding new patterns the one with
    /// the later `start_time` wins. Non-unique patterns are appended.
    /// Expired patterns are evicted afterwards.
    pub fn store_patterns(&self, user_id: &str, patterns: Vec<AtomicPattern>) {
        self.store_patterns_at(user_id, patterns, Utc::now());
    }

    fn store_patterns_at(&self, user_id: &str, patterns: Vec<AtomicPattern>, now: DateTime<Utc>) {
        if patterns.is_empty() {
            return;
        }

        let mut guard = self.inner.lock().unwrap();
        let entry = guard.entry(user_id.to_string()).or_default();

        let (unique, non_unique): (Vec<_>, Vec<_>) =
            patterns.into_iter().partition(|p| p.unique);

        // Among colliding new unique patterns, keep the later start_time.
        let mut winners: HashMap<PatternKey, AtomicPattern> = HashMap::new();
        for pattern in unique {
            let key = pattern.key();
            match winners.get(&key) {
                Some(existing) if existing.start_time >= pattern.start_time => {}
                _ => {
                    winners.insert(key, pattern);
                }
            }
        }

        // Replace stored instances sharing a winner's key; everything else stays.
        for (key, pattern) in winners {
            entry.atomics.retain(|stored| stored.key() != key);
            trace!(
                user_id,
                pattern_id = %pattern.pattern_id,
                severity = pattern.severity,
                "Stored unique pattern"
            );
            entry.atomics.push(pattern);
        }

        for pattern in non_unique {
            trace!(
                user_id,
                pattern_id = %pattern.pattern_id,
                severity = pattern.severity,
                "Stored pattern"
            );
            entry.atomics.push(pattern);
        }

        Self::evict_expired(entry, now);
    }

    /// Store composite patterns for a user and evict expired entries.
    pub fn store_composites(&self, user_id: &str, composites: Vec<CompositePattern>) {
        self.store_composites_at(user_id, composites, Utc::now());
    }

    fn store_composites_at(
        &self,
        user_id: &str,
        composites: Vec<CompositePattern>,
        now: DateTime<Utc>,
    ) {
        if composites.is_empty() {
            return;
        }

        let mut guard = self.inner.lock().unwrap();
        let entry = guard.entry(user_id.to_string()).or_default();
        for composite in composites {
            debug!(
                user_id,
                pattern_id = %composite.pattern_id,
                confidence = composite.confidence,
                components = composite.component_patterns.len(),
                "Stored composite pattern"
            );
            entry.composites.push(composite);
        }
        Self::evict_expired(entry, now);
    }

    /// Flag stored atomic patterns as consumed by a composite match.
    pub fn mark_consumed(&self, user_id: &str, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let mut guard = self.inner.lock().unwrap();
        if let Some(entry) = guard.get_mut(user_id) {
            for pattern in entry.atomics.iter_mut() {
                if ids.contains(&pattern.id) {
                    pattern.consumed = true;
                }
            }
        }
    }

    /// Return active patterns whose window intersects `[now - hours, now]`.
    pub fn get_user_patterns(
        &self,
        user_id: &str,
        hours: i64,
    ) -> (Vec<AtomicPattern>, Vec<CompositePattern>) {
        self.get_user_patterns_at(user_id, hours, Utc::now())
    }

    fn get_user_patterns_at(
        &self,
        user_id: &str,
        hours: i64,
        now: DateTime<Utc>,
    ) -> (Vec<AtomicPattern>, Vec<CompositePattern>) {
        let guard = self.inner.lock().unwrap();
        match guard.get(user_id) {
            None => (Vec::new(), Vec::new()),
            Some(entry) => {
                let atomics = entry
                    .atomics
                    .iter()
                    .filter(|p| p.is_active_at(now) && p.intersects_window(now, hours))
                    .cloned()
                    .collect();
                let composites = entry
                    .composites
                    .iter()
                    .filter(|c| c.is_active_at(now) && c.intersects_window(now, hours))
                    .cloned()
                    .collect();
                (atomics, composites)
            }
        }
    }

    /// Count of stored (not necessarily active) patterns for a user.
    pub fn pattern_count(&self, user_id: &str) -> usize {
        let guard = self.inner.lock().unwrap();
        guard
            .get(user_id)
            .map(|e| e.atomics.len() + e.composites.len())
            .unwrap_or(0)
    }

    fn evict_expired(entry: &mut UserPatterns, now: DateTime<Utc>) {
        let before = entry.atomics.len() + entry.composites.len();
        entry.atomics.retain(|p| p.is_active_at(now));
        entry.composites.retain(|c| c.is_active_at(now));
        let evicted = before - entry.atomics.len() - entry.composites.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired patterns");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RiskCategory;
    use chrono::Duration;

    fn unique_pattern(
        pattern_id: &str,
        position: &str,
        start: DateTime<Utc>,
    ) -> AtomicPattern {
        AtomicPattern::new(pattern_id, "user-1", 0.6, RiskCategory::Overconfidence)
            .with_position(position)
            .with_window(start, None)
            .unique()
    }

    #[test]
    fn test_unique_dedup_keeps_later_start_time() {
        let store = PatternStore::new();
        let now = Utc::now();

        let older = unique_pattern("oversized_trade", "pos-1", now - Duration::minutes(30));
        let newer = unique_pattern("oversized_trade", "pos-1", now - Duration::minutes(5));
        let newer_id = newer.id.clone();

        store.store_patterns("user-1", vec![older, newer]);

        let (atomics, _) = store.get_user_patterns("user-1", 24);
        assert_eq!(atomics.len(), 1);
        assert_eq!(atomics[0].id, newer_id);
    }

    #[test]
    fn test_unique_replaces_stored_instance_with_same_key() {
        let store = PatternStore::new();
        let now = Utc::now();

        store.store_patterns(
            "user-1",
            vec![unique_pattern("oversized_trade", "pos-1", now - Duration::minutes(30))],
        );
        store.store_patterns(
            "user-1",
            vec![unique_pattern("oversized_trade", "pos-1", now - Duration::minutes(1))],
        );

        let (atomics, _) = store.get_user_patterns("user-1", 24);
        assert_eq!(atomics.len(), 1);
    }

    #[test]
    fn test_store_is_additive_across_keys() {
        let store = PatternStore::new();
        let now = Utc::now();

        store.store_patterns(
            "user-1",
            vec![unique_pattern("oversized_trade", "pos-1", now)],
        );
        store.store_patterns(
            "user-1",
            vec![
                unique_pattern("oversized_trade", "pos-2", now),
                AtomicPattern::new("overtrading", "user-1", 0.3, RiskCategory::Overtrading)
                    .with_window(now, None),
            ],
        );

        let (atomics, _) = store.get_user_patterns("user-1", 24);
        assert_eq!(atomics.len(), 3);
    }

    #[test]
    fn test_ttl_eviction() {
        let store = PatternStore::new();
        let now = Utc::now();

        let expired = AtomicPattern::new("overtrading", "user-1", 0.5, RiskCategory::Overtrading)
            .with_window(now - Duration::minutes(90), None)
            .with_ttl(60);
        let eternal = AtomicPattern::new("volume_limit", "user-1", 0.5, RiskCategory::Overconfidence)
            .with_window(now - Duration::days(30), None);

        store.store_patterns("user-1", vec![expired, eternal]);

        let (atomics, _) = store.get_user_patterns("user-1", 24 * 365);
        assert_eq!(atomics.len(), 1);
        assert_eq!(atomics[0].pattern_id, "volume_limit");
    }

    #[test]
    fn test_unknown_user_returns_empty() {
        let store = PatternStore::new();
        let (atomics, composites) = store.get_user_patterns("nobody", 24);
        assert!(atomics.is_empty());
        assert!(composites.is_empty());
        assert_eq!(store.pattern_count("nobody"), 0);
    }

    #[test]
    fn test_mark_consumed() {
        let store = PatternStore::new();
        let now = Utc::now();
        let pattern = AtomicPattern::new("cooldown_violation", "user-1", 0.7, RiskCategory::Overconfidence)
            .with_window(now, None);
        let id = pattern.id.clone();

        store.store_patterns("user-1", vec![pattern]);
        store.mark_consumed("user-1", &[id]);

        let (atomics, _) = store.get_user_patterns("user-1", 24);
        assert!(atomics[0].consumed);
    }
}
