//! Per-user activity state providers.
//!
//! Read-only query surfaces over job, position, and equity history, plus the
//! user-limits configuration lookup. Each store guards its state with one
//! mutual-exclusion lock; lookups for unknown users return empty results.

mod equity;
mod events;
mod jobs;
mod limits;
mod positions;

pub use equity::{DrawdownSnapshot, EquitySnapshot, EquityStore};
pub use events::ActivityEvent;
pub use jobs::{Job, JobSide, JobStore};
pub use limits::{InMemoryLimits, LimitsProvider, UserLimits};
pub use positions::{Position, PositionStore};
