//! Rollback Strategy Port
//!
//! A named, pluggable compensating action applied after a phase failure.
//! Strategies are registered by label and looked up through the plan's
//! declared rollback strategy.

use async_trait::async_trait;
use rollout_core::execution::ExecutionRun;
use rollout_core::plan::Phase;

/// Rollback strategy error types
#[derive(thiserror::Error, Debug)]
pub enum RollbackError {
    #[error("strategy failed: {0}")]
    Failed(String),
}

/// Pluggable rollback strategy port
#[async_trait]
pub trait RollbackStrategy: Send + Sync {
    /// Apply the compensating action for a failed phase
    async fn apply(&self, run: &ExecutionRun, failed_phase: &Phase) -> Result<(), RollbackError>;
}
