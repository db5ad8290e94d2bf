//! Job history store.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Direction of a trading job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSide {
    Buy,
    Sell,
}

/// One recorded trading job (order submission).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: JobSide,
    /// Notional value in account currency.
    pub notional: Decimal,
    /// Position this job contributed to, if known.
    pub position_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user job history with a rolling retention window.
#[derive(Debug)]
pub struct JobStore {
    inner: Mutex<HashMap<String, Vec<Job>>>,
    max_history: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_history: 2000,
        }
    }
}

impl JobStore {
    /// Create an empty job store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job, keeping per-user history sorted by creation time.
    pub fn record_job(&self, job: Job) {
        let mut guard = self.inner.lock().unwrap();
        let jobs = guard.entry(job.user_id.clone()).or_default();
        jobs.push(job);
        jobs.sort_by_key(|j| j.created_at);
        let len = jobs.len();
        if len > self.max_history {
            jobs.drain(0..len - self.max_history);
        }
    }

    /// Jobs created at or after `since`, oldest first.
    pub fn jobs_since(&self, user_id: &str, since: DateTime<Utc>) -> Vec<Job> {
        let guard = self.inner.lock().unwrap();
        guard
            .get(user_id)
            .map(|jobs| {
                jobs.iter()
                    .filter(|j| j.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Jobs created within the last `minutes`.
    pub fn recent_jobs(&self, user_id: &str, minutes: i64) -> Vec<Job> {
        self.jobs_since(user_id, Utc::now() - Duration::minutes(minutes))
    }

    /// Jobs created during the current UTC day.
    pub fn jobs_today(&self, user_id: &str) -> Vec<Job> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(Utc::now);
        self.jobs_since(user_id, midnight)
    }

    /// Total notional traded during the current UTC day.
    pub fn volume_today(&self, user_id: &str) -> Decimal {
        self.jobs_today(user_id)
            .iter()
            .map(|j| j.notional)
            .sum()
    }

    /// All users with recorded jobs.
    pub fn user_ids(&self) -> Vec<String> {
        let guard = self.inner.lock().unwrap();
        guard.keys().cloned().collect()
    }
}
