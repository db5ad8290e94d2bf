//! Canonical inbound activity event model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Job, Position};

/// One inbound activity update. The single event model recorded by ingestion;
/// consumers match it exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    /// A trading job (order submission) was recorded.
    Job(Job),
    /// A position was opened or updated.
    PositionUpdate(Position),
    /// A position was closed.
    PositionClosed {
        user_id: String,
        position_key: String,
    },
    /// An account equity snapshot was taken.
    EquitySnapshot {
        user_id: String,
        equity: Decimal,
        timestamp: DateTime<Utc>,
    },
}

impl ActivityEvent {
    /// The user this event belongs to.
    pub fn user_id(&self) -> &str {
        match self {
            ActivityEvent::Job(job) => &job.user_id,
            ActivityEvent::PositionUpdate(position) => &position.user_id,
            ActivityEvent::PositionClosed { user_id, .. } => user_id,
            ActivityEvent::EquitySnapshot { user_id, .. } => user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobSide;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ActivityEvent::EquitySnapshot {
            user_id: "user-1".to_string(),
            equity: dec!(10000),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "equity_snapshot");

        let job_event = ActivityEvent::Job(Job {
            job_id: "j1".to_string(),
            user_id: "user-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: JobSide::Buy,
            notional: dec!(100),
            position_key: None,
            created_at: Utc::now(),
        });
        assert_eq!(job_event.user_id(), "user-1");
    }
}
