//! Metrics Source Port
//!
//! One source per monitored subsystem (service mesh health, edge
//! performance, security posture, ...). Each tick the collector asks every
//! source for a partial sample and merges them.

use async_trait::async_trait;
use rollout_core::metrics::MetricsSample;

/// Metrics source error types
#[derive(thiserror::Error, Debug)]
pub enum MetricsSourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Pluggable metrics source port
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Name of the monitored subsystem, for logs
    fn name(&self) -> &str;

    /// Produce a partial sample of this subsystem's current values
    async fn sample(&self) -> Result<MetricsSample, MetricsSourceError>;
}
