//! Phase Executor Service
//!
//! Runs every task of a phase concurrently, bounded by the configured
//! concurrency limit. The first task to exhaust its retries cancels the
//! in-flight siblings and the phase returns without waiting for stragglers.
//! Outcomes are always reported in dispatch order.

use crate::config::PhaseExecutorConfig;
use crate::task_runner::TaskRunner;
use crate::validation::ValidationGate;
use rollout_core::execution::{PhaseResult, RunId, TaskDisposition, TaskOutcome};
use rollout_core::plan::{Phase, Task};
use rollout_ports::executor::TaskContext;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Executes one phase: concurrent tasks, then validation criteria
pub struct PhaseExecutor {
    runner: Arc<TaskRunner>,
    gate: Arc<ValidationGate>,
    max_concurrent_tasks: Option<usize>,
}

impl PhaseExecutor {
    pub fn new(
        runner: Arc<TaskRunner>,
        gate: Arc<ValidationGate>,
        config: PhaseExecutorConfig,
    ) -> Self {
        Self {
            runner,
            gate,
            max_concurrent_tasks: config.max_concurrent_tasks,
        }
    }

    /// Execute all tasks of the phase, then its validation criteria.
    /// The returned result carries every outcome in dispatch order; a
    /// criterion breach fails the phase even when every task succeeded.
    pub async fn execute(&self, run_id: RunId, phase: &Phase) -> PhaseResult {
        let mut result = PhaseResult::new(phase.id.clone());
        let total = phase.tasks.len();

        info!(phase = %phase.id, tasks = total, "executing phase");

        let mut failed = false;
        if total > 0 {
            let limit = self.max_concurrent_tasks.unwrap_or(total).max(1);
            let semaphore = Arc::new(Semaphore::new(limit));
            let cancel = CancellationToken::new();
            let (tx, mut rx) = mpsc::unbounded_channel::<(usize, TaskOutcome)>();

            let mut handles = Vec::with_capacity(total);
            for (index, task) in phase.tasks.iter().cloned().enumerate() {
                let runner = self.runner.clone();
                let semaphore = semaphore.clone();
                let token = cancel.child_token();
                let tx = tx.clone();
                let phase_id = phase.id.clone();

                handles.push(tokio::spawn(async move {
                    let ctx = TaskContext::new(run_id, phase_id, token);
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => runner.run_task(&task, &ctx).await,
                        Err(_) => cancelled_outcome(&task, "concurrency limiter closed"),
                    };
                    let _ = tx.send((index, outcome));
                }));
            }
            drop(tx);

            let mut slots: Vec<Option<TaskOutcome>> = (0..total).map(|_| None).collect();
            while let Some((index, outcome)) = rx.recv().await {
                let is_failure = outcome.disposition.is_failure();
                slots[index] = Some(outcome);

                if is_failure {
                    failed = true;
                    warn!(phase = %phase.id, "task exhausted retries, cancelling in-flight siblings");
                    cancel.cancel();
                    for handle in &handles {
                        handle.abort();
                    }
                    // Keep outcomes that already settled; don't wait for
                    // the aborted stragglers.
                    while let Ok((i, o)) = rx.try_recv() {
                        slots[i] = Some(o);
                    }
                    break;
                }
            }

            for (index, slot) in slots.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = Some(cancelled_outcome(
                        &phase.tasks[index],
                        "cancelled after sibling task failure",
                    ));
                }
            }
            result.outcomes = slots.into_iter().flatten().collect();
        }

        if !failed {
            let snapshot = self.gate.snapshot_for(&phase.criteria).await;
            let (passed, breaches) = self.gate.evaluate(&phase.criteria, &snapshot);
            if !passed {
                warn!(phase = %phase.id, breaches = breaches.len(), "phase validation breached");
            }
            result.breaches = breaches;
        }

        info!(phase = %phase.id, success = result.is_success(), "phase settled");
        result
    }
}

fn cancelled_outcome(task: &Task, reason: &str) -> TaskOutcome {
    let now = chrono::Utc::now();
    TaskOutcome {
        task_id: task.id.clone(),
        name: task.name.clone(),
        disposition: TaskDisposition::Cancelled,
        retry_count: 0,
        error: Some(reason.to_string()),
        started_at: now,
        finished_at: now,
    }
}
