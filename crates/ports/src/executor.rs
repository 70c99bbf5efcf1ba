//! Task Executor Port
//!
//! The engine dispatches each task to the executor registered for its kind
//! and never knows what "infrastructure" or "security" work actually does.

use async_trait::async_trait;
use rollout_core::execution::RunId;
use rollout_core::plan::{PhaseId, Task};
use tokio_util::sync::CancellationToken;

/// Per-task execution context handed to the executor
///
/// Carries the cooperative cancellation token for the task: a sibling
/// failure in the same phase cancels the token, never the whole process.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub run_id: RunId,
    pub phase_id: PhaseId,
    cancellation: CancellationToken,
}

impl TaskContext {
    pub fn new(run_id: RunId, phase_id: PhaseId, cancellation: CancellationToken) -> Self {
        Self {
            run_id,
            phase_id,
            cancellation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Completes when the task has been cancelled
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Executor error types
#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error("execution failed: {0}")]
    Failed(String),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable task executor port, registered per task kind
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one attempt of the task. The configuration map is opaque to the
    /// engine; only the executor for this kind interprets it.
    async fn run(&self, task: &Task, ctx: &TaskContext)
        -> Result<serde_json::Value, ExecutorError>;
}
