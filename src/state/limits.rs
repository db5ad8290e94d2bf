//! User trading limits lookup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Per-user trading caps. Every cap is optional; a missing cap disables the
/// dependent check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserLimits {
    /// Maximum notional for a single job.
    pub max_job_notional: Option<Decimal>,
    /// Maximum number of jobs per UTC day.
    pub max_daily_jobs: Option<u32>,
    /// Maximum total notional per UTC day.
    pub max_daily_volume: Option<Decimal>,
    /// Minimum minutes between consecutive jobs.
    pub cooldown_minutes: Option<i64>,
    /// Maximum concurrently open positions.
    pub max_open_positions: Option<u32>,
}

/// Lookup of configured user limits. Returns `None` for users without limits.
pub trait LimitsProvider: Send + Sync {
    fn get_user_limits(&self, user_id: &str) -> Option<UserLimits>;
}

/// In-memory limits provider with an optional fallback for unknown users.
#[derive(Debug, Default)]
pub struct InMemoryLimits {
    inner: Mutex<HashMap<String, UserLimits>>,
    fallback: Option<UserLimits>,
}

impl InMemoryLimits {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that serves `fallback` for unknown users.
    pub fn with_fallback(fallback: UserLimits) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            fallback: Some(fallback),
        }
    }

    /// Set limits for one user.
    pub fn set(&self, user_id: &str, limits: UserLimits) {
        let mut guard = self.inner.lock().unwrap();
        guard.insert(user_id.to_string(), limits);
    }
}

impl LimitsProvider for InMemoryLimits {
    fn get_user_limits(&self, user_id: &str) -> Option<UserLimits> {
        let guard = self.inner.lock().unwrap();
        guard.get(user_id).cloned().or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lookup_and_fallback() {
        let provider = InMemoryLimits::with_fallback(UserLimits {
            max_daily_jobs: Some(20),
            ..Default::default()
        });
        provider.set(
            "user-1",
            UserLimits {
                max_job_notional: Some(dec!(5000)),
                ..Default::default()
            },
        );

        assert_eq!(
            provider
                .get_user_limits("user-1")
                .and_then(|l| l.max_job_notional),
            Some(dec!(5000))
        );
        assert_eq!(
            provider
                .get_user_limits("stranger")
                .and_then(|l| l.max_daily_jobs),
            Some(20)
        );
    }
}
