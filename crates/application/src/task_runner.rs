//! Task Runner Service
//!
//! Executes one task with a per-attempt timeout and a bounded retry budget,
//! dispatching to the executor registered for the task's kind. Retries use
//! a fixed backoff delay from the runner configuration.

use crate::config::TaskRunnerConfig;
use rollout_core::execution::{TaskDisposition, TaskOutcome};
use rollout_core::plan::{Task, TaskKind};
use rollout_ports::executor::{Executor, TaskContext};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Executors keyed by the task kind they handle
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskKind, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executor(mut self, kind: TaskKind, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(kind, executor);
        self
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn Executor>> {
        self.executors.get(&kind).cloned()
    }
}

/// Runs a single task to its terminal disposition
pub struct TaskRunner {
    executors: Arc<ExecutorRegistry>,
    retry_backoff: Duration,
}

impl TaskRunner {
    pub fn new(executors: Arc<ExecutorRegistry>, config: TaskRunnerConfig) -> Self {
        Self {
            executors,
            retry_backoff: config.retry_backoff,
        }
    }

    /// Run the task until it succeeds, exhausts its retries, or is
    /// cancelled. Always returns an outcome; the disposition carries the
    /// terminal state.
    pub async fn run_task(&self, task: &Task, ctx: &TaskContext) -> TaskOutcome {
        let started_at = chrono::Utc::now();

        let Some(executor) = self.executors.get(task.kind) else {
            warn!(task = %task.id, kind = %task.kind, "no executor registered for task kind");
            return finished(
                task,
                TaskDisposition::Failed,
                0,
                Some(format!("no executor registered for kind {}", task.kind)),
                started_at,
            );
        };

        let mut retry_count = 0u32;
        let mut timed_out;
        let mut last_error;

        loop {
            if ctx.is_cancelled() {
                return cancelled(task, retry_count, started_at);
            }

            let attempt = tokio::select! {
                _ = ctx.cancelled() => {
                    return cancelled(task, retry_count, started_at);
                }
                result = tokio::time::timeout(task.timeout(), executor.run(task, ctx)) => result,
            };

            match attempt {
                Ok(Ok(_output)) => {
                    debug!(task = %task.id, retry_count, "task succeeded");
                    return finished(task, TaskDisposition::Succeeded, retry_count, None, started_at);
                }
                Ok(Err(err)) => {
                    timed_out = false;
                    last_error = err.to_string();
                    warn!(task = %task.id, attempt = retry_count + 1, error = %last_error, "task attempt failed");
                }
                Err(_elapsed) => {
                    timed_out = true;
                    last_error = format!("attempt exceeded timeout of {}ms", task.timeout_ms);
                    warn!(task = %task.id, attempt = retry_count + 1, timeout_ms = task.timeout_ms, "task attempt timed out");
                }
            }

            // Cancellation wins over an attempt failure observed in the
            // same poll; a cancelled task is not a retry-exhausted one.
            if ctx.is_cancelled() {
                return cancelled(task, retry_count, started_at);
            }

            if retry_count >= task.max_retries {
                let disposition = if timed_out {
                    TaskDisposition::TimedOut
                } else {
                    TaskDisposition::Failed
                };
                return finished(task, disposition, retry_count, Some(last_error), started_at);
            }

            retry_count += 1;
            debug!(task = %task.id, retry = retry_count, backoff_ms = self.retry_backoff.as_millis() as u64, "retrying task");

            tokio::select! {
                _ = ctx.cancelled() => {
                    return cancelled(task, retry_count, started_at);
                }
                _ = tokio::time::sleep(self.retry_backoff) => {}
            }
        }
    }
}

fn finished(
    task: &Task,
    disposition: TaskDisposition,
    retry_count: u32,
    error: Option<String>,
    started_at: chrono::DateTime<chrono::Utc>,
) -> TaskOutcome {
    TaskOutcome {
        task_id: task.id.clone(),
        name: task.name.clone(),
        disposition,
        retry_count,
        error,
        started_at,
        finished_at: chrono::Utc::now(),
    }
}

fn cancelled(
    task: &Task,
    retry_count: u32,
    started_at: chrono::DateTime<chrono::Utc>,
) -> TaskOutcome {
    debug!(task = %task.id, "task cancelled");
    finished(
        task,
        TaskDisposition::Cancelled,
        retry_count,
        Some("cancelled".to_string()),
        started_at,
    )
}
