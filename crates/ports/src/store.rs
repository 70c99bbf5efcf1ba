//! Persistence Ports
//!
//! Run and metrics history are in-memory by default; a durable store is an
//! optional collaborator behind these interfaces. The engine calls them but
//! never implements durability itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollout_core::execution::{ExecutionRun, RunId};
use rollout_core::metrics::MetricsSample;
use rollout_core::plan::PlanId;

/// Store error types
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Execution run persistence port
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist the current state of a run (insert or overwrite)
    async fn save_run(&self, run: &ExecutionRun) -> Result<(), StoreError>;

    /// Snapshot of a run by id
    async fn get_run(&self, id: &RunId) -> Result<Option<ExecutionRun>, StoreError>;

    /// Snapshots of every run of a plan, oldest first
    async fn list_runs(&self, plan_id: &PlanId) -> Result<Vec<ExecutionRun>, StoreError>;
}

/// Metrics history persistence port
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn save_sample(&self, sample: &MetricsSample) -> Result<(), StoreError>;

    /// Samples collected at or after the given instant, oldest first
    async fn query_samples(&self, since: DateTime<Utc>) -> Result<Vec<MetricsSample>, StoreError>;
}
