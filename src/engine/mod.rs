//! The concurrent evaluation orchestrator.
//!
//! A bounded request queue feeds a dispatcher that runs per-user evaluation
//! batches on a bounded worker pool; a background sweep re-evaluates users
//! with open positions on a fixed interval.

mod processor;
mod publisher;

pub use processor::{EvaluationRequest, MetricsSnapshot, RiskProcessor};
pub use publisher::{ChannelPublisher, LogPublisher, ReportPublisher};
