//! Rollback Controller Service
//!
//! Applies the plan's declared rollback strategy after a phase failure.
//! A rollback failure is always surfaced: the system is in an undefined
//! state and an operator has to be escalated to.

use rollout_core::execution::ExecutionRun;
use rollout_core::plan::Phase;
use rollout_core::{DomainError, Result};
use rollout_ports::rollback::RollbackStrategy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Named rollback strategies, looked up by the plan's declared label
#[derive(Default)]
pub struct RollbackController {
    strategies: HashMap<String, Arc<dyn RollbackStrategy>>,
}

impl RollbackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(
        mut self,
        label: impl Into<String>,
        strategy: Arc<dyn RollbackStrategy>,
    ) -> Self {
        self.strategies.insert(label.into(), strategy);
        self
    }

    /// Apply the strategy registered under `strategy_label` to compensate
    /// for the failed phase. Unknown labels and strategy errors both
    /// surface as `RollbackFailed`; neither is retried.
    pub async fn rollback(
        &self,
        run: &ExecutionRun,
        strategy_label: &str,
        failed_phase: &Phase,
    ) -> Result<()> {
        let strategy = self.strategies.get(strategy_label).ok_or_else(|| {
            error!(run_id = %run.id, strategy = strategy_label, "unknown rollback strategy");
            DomainError::RollbackFailed(format!("unknown rollback strategy: {}", strategy_label))
        })?;

        info!(
            run_id = %run.id,
            phase = %failed_phase.id,
            strategy = strategy_label,
            "applying rollback strategy"
        );

        strategy.apply(run, failed_phase).await.map_err(|err| {
            error!(run_id = %run.id, strategy = strategy_label, error = %err, "rollback strategy failed");
            DomainError::RollbackFailed(err.to_string())
        })?;

        info!(run_id = %run.id, strategy = strategy_label, "rollback applied");
        Ok(())
    }
}
