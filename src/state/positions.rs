//! Open-position store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::utils::decimal::loss_fraction;

/// One open position for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_key: String,
    pub user_id: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Position value at entry.
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * self.quantity.abs()
    }

    /// Current position value at mark.
    pub fn mark_value(&self) -> Decimal {
        self.mark_price * self.quantity.abs()
    }

    /// Fraction of the cost basis currently lost (0 when profitable).
    pub fn loss_fraction(&self) -> f64 {
        if self.unrealized_pnl >= Decimal::ZERO {
            return 0.0;
        }
        loss_fraction(self.cost_basis() + self.unrealized_pnl, self.cost_basis())
    }

    /// Hours the position has been open.
    pub fn hours_open(&self) -> f64 {
        let duration = Utc::now() - self.opened_at;
        duration.num_seconds() as f64 / 3600.0
    }
}

/// Per-user open positions keyed by position key.
#[derive(Debug, Default)]
pub struct PositionStore {
    inner: Mutex<HashMap<String, HashMap<String, Position>>>,
}

impl PositionStore {
    /// Create an empty position store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a position.
    pub fn upsert(&self, position: Position) {
        let mut guard = self.inner.lock().unwrap();
        guard
            .entry(position.user_id.clone())
            .or_default()
            .insert(position.position_key.clone(), position);
    }

    /// Remove a position, returning it if present.
    pub fn close(&self, user_id: &str, position_key: &str) -> Option<Position> {
        let mut guard = self.inner.lock().unwrap();
        guard.get_mut(user_id).and_then(|m| m.remove(position_key))
    }

    /// Look up one position.
    pub fn position(&self, user_id: &str, position_key: &str) -> Option<Position> {
        let guard = self.inner.lock().unwrap();
        guard.get(user_id).and_then(|m| m.get(position_key)).cloned()
    }

    /// All open positions for a user.
    pub fn open_positions(&self, user_id: &str) -> Vec<Position> {
        let guard = self.inner.lock().unwrap();
        guard
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Count of open positions for a user.
    pub fn open_position_count(&self, user_id: &str) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.get(user_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Users that currently have at least one open position.
    pub fn users_with_positions(&self) -> Vec<String> {
        let guard = self.inner.lock().unwrap();
        guard
            .iter()
            .filter(|(_, positions)| !positions.is_empty())
            .map(|(user, _)| user.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn position(key: &str, pnl: Decimal) -> Position {
        Position {
            position_key: key.to_string(),
            user_id: "user-1".to_string(),
            symbol: "ETHUSDT".to_string(),
            quantity: dec!(2),
            entry_price: dec!(2000),
            mark_price: dec!(2000),
            unrealized_pnl: pnl,
            opened_at: Utc::now() - Duration::hours(3),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_and_close() {
        let store = PositionStore::new();
        store.upsert(position("pos-1", dec!(0)));
        store.upsert(position("pos-1", dec!(-50)));

        assert_eq!(store.open_position_count("user-1"), 1);
        assert_eq!(
            store.position("user-1", "pos-1").map(|p| p.unrealized_pnl),
            Some(dec!(-50))
        );

        assert!(store.close("user-1", "pos-1").is_some());
        assert_eq!(store.open_position_count("user-1"), 0);
        assert!(store.users_with_positions().is_empty());
    }

    #[test]
    fn test_loss_fraction() {
        // Cost basis 4000, down 400 => 10% underwater.
        let pos = position("pos-1", dec!(-400));
        assert!((pos.loss_fraction() - 0.1).abs() < 1e-9);

        let profitable = position("pos-2", dec!(100));
        assert_eq!(profitable.loss_fraction(), 0.0);
    }
}
