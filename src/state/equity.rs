//! Account equity history and drawdown tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::utils::decimal::loss_fraction;

/// A single equity snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct EquitySnapshot {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Peak/current drawdown over a user's snapshot history.
#[derive(Debug, Clone)]
pub struct DrawdownSnapshot {
    pub peak_equity: Decimal,
    pub current_equity: Decimal,
    /// Fraction lost from peak, in [0, 1].
    pub drawdown: f64,
}

/// Per-user equity curve with a rolling snapshot window.
#[derive(Debug)]
pub struct EquityStore {
    inner: Mutex<HashMap<String, VecDeque<EquitySnapshot>>>,
    max_history: usize,
}

impl Default for EquityStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_history: 1000,
        }
    }
}

impl EquityStore {
    /// Create an empty equity store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an equity snapshot.
    pub fn record(&self, user_id: &str, equity: Decimal, at: DateTime<Utc>) {
        let mut guard = self.inner.lock().unwrap();
        let history = guard.entry(user_id.to_string()).or_default();
        history.push_back(EquitySnapshot {
            timestamp: at,
            equity,
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Most recent snapshot for a user.
    pub fn latest(&self, user_id: &str) -> Option<EquitySnapshot> {
        let guard = self.inner.lock().unwrap();
        guard.get(user_id).and_then(|h| h.back().cloned())
    }

    /// Snapshots at or after `since`, oldest first.
    pub fn history_since(&self, user_id: &str, since: DateTime<Utc>) -> Vec<EquitySnapshot> {
        let guard = self.inner.lock().unwrap();
        guard
            .get(user_id)
            .map(|h| {
                h.iter()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drawdown from the observed equity peak, if any history exists.
    pub fn drawdown(&self, user_id: &str) -> Option<DrawdownSnapshot> {
        let guard = self.inner.lock().unwrap();
        let history = guard.get(user_id)?;
        let current = history.back()?.equity;
        let peak = history
            .iter()
            .map(|s| s.equity)
            .max()
            .unwrap_or(current);
        Some(DrawdownSnapshot {
            peak_equity: peak,
            current_equity: current,
            drawdown: loss_fraction(current, peak),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_drawdown_from_peak() {
        let store = EquityStore::new();
        let now = Utc::now();
        store.record("user-1", dec!(10000), now - Duration::hours(3));
        store.record("user-1", dec!(10500), now - Duration::hours(2));
        store.record("user-1", dec!(9975), now);

        let dd = store.drawdown("user-1").unwrap();
        assert_eq!(dd.peak_equity, dec!(10500));
        assert_eq!(dd.current_equity, dec!(9975));
        assert!((dd.drawdown - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_no_history_no_drawdown() {
        let store = EquityStore::new();
        assert!(store.drawdown("nobody").is_none());
        assert!(store.latest("nobody").is_none());
    }
}
