//! Outbound risk report publishing.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::aggregation::RiskReport;
use crate::pattern::RiskLevel;

/// Outbound seam for publishing risk reports. Transport lives behind this
/// trait; the engine never rolls back state on publish failure.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, report: &RiskReport) -> Result<()>;
}

/// Publishes reports as structured log records for downstream parsing.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl LogPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportPublisher for LogPublisher {
    async fn publish(&self, report: &RiskReport) -> Result<()> {
        let json = serde_json::to_string(report).unwrap_or_default();
        match report.top_risk_level {
            RiskLevel::None | RiskLevel::Low => {
                info!(target: "risk_report", "RISK_REPORT: {}", json);
            }
            RiskLevel::Medium => warn!(target: "risk_report", "RISK_REPORT: {}", json),
            RiskLevel::High | RiskLevel::Critical => {
                error!(target: "risk_report", "RISK_REPORT: {}", json);
            }
        }
        Ok(())
    }
}

/// Publishes reports onto an unbounded channel; used by tests and the
/// simulation mode to observe the pipeline's output.
#[derive(Debug)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<RiskReport>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RiskReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReportPublisher for ChannelPublisher {
    async fn publish(&self, report: &RiskReport) -> Result<()> {
        self.tx
            .send(report.clone())
            .map_err(|_| anyhow::anyhow!("Report channel closed"))
    }
}
