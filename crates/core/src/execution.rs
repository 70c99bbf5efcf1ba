//! Execution Run Domain Entity
//!
//! This module contains the ExecutionRun aggregate root: one record per
//! invocation of a registered plan, holding per-task outcomes, partial
//! progress and the single terminal status of the run.

use crate::plan::{Breach, PhaseId, PlanId, TaskId};
use crate::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Run identifier - Value Object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run status - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    RolledBack,
    RollbackFailed,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
            Self::RollbackFailed => "rollback_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal disposition of a single task attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDisposition {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskDisposition {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// A failure that exhausts the retry budget; cancellation is not one.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

/// Outcome of one task within a phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub name: String,
    pub disposition: TaskDisposition,
    pub retry_count: u32,
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl TaskOutcome {
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }
}

/// Result of executing one phase: every task outcome in dispatch order,
/// plus any validation breaches observed after the tasks settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_id: PhaseId,
    pub outcomes: Vec<TaskOutcome>,
    pub breaches: Vec<Breach>,
}

impl PhaseResult {
    pub fn new(phase_id: PhaseId) -> Self {
        Self {
            phase_id,
            outcomes: vec![],
            breaches: vec![],
        }
    }

    pub fn is_success(&self) -> bool {
        self.breaches.is_empty() && self.outcomes.iter().all(|o| o.disposition.is_success())
    }

    /// The phase failure, if any: the first failing task in dispatch order,
    /// or the collected criteria breaches when every task succeeded.
    pub fn failure(&self) -> Option<DomainError> {
        if let Some(outcome) = self.outcomes.iter().find(|o| o.disposition.is_failure()) {
            let error = match outcome.disposition {
                TaskDisposition::TimedOut => DomainError::TaskTimeout {
                    task: outcome.task_id.to_string(),
                    attempts: outcome.attempts(),
                },
                _ => DomainError::TaskFailed {
                    task: outcome.task_id.to_string(),
                    attempts: outcome.attempts(),
                    reason: outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                },
            };
            return Some(error);
        }

        if !self.breaches.is_empty() {
            return Some(DomainError::ValidationBreach(self.breaches.clone()));
        }

        None
    }
}

/// Execution run aggregate root
///
/// Mutated only by the orchestrator driving the run; everyone else reads
/// snapshots through the run store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRun {
    pub id: RunId,
    pub plan_id: PlanId,
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub current_phase: Option<PhaseId>,
    pub completed_phases: Vec<PhaseId>,
    pub task_outcomes: HashMap<PhaseId, Vec<TaskOutcome>>,
    pub breaches: Vec<Breach>,
    pub errors: Vec<String>,
}

impl ExecutionRun {
    pub fn new(plan_id: PlanId) -> Self {
        Self {
            id: RunId::new(),
            plan_id,
            status: RunStatus::Running,
            started_at: chrono::Utc::now(),
            completed_at: None,
            current_phase: None,
            completed_phases: Vec::new(),
            task_outcomes: HashMap::new(),
            breaches: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::Validation(format!(
                "run {} is already terminal ({})",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Point the run at the phase about to execute
    pub fn begin_phase(&mut self, phase_id: PhaseId) -> Result<()> {
        self.ensure_running()?;
        self.current_phase = Some(phase_id);
        Ok(())
    }

    /// Record the outcomes and breaches of an executed phase
    pub fn record_phase_result(&mut self, result: &PhaseResult) {
        self.task_outcomes
            .insert(result.phase_id.clone(), result.outcomes.clone());
        self.breaches.extend(result.breaches.iter().cloned());
    }

    /// Mark the current phase as successfully completed
    pub fn complete_phase(&mut self, phase_id: PhaseId) -> Result<()> {
        self.ensure_running()?;
        self.completed_phases.push(phase_id);
        Ok(())
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn succeed(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.status = RunStatus::Succeeded;
        self.current_phase = None;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn fail(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.status = RunStatus::Failed;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn mark_rolled_back(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.status = RunStatus::RolledBack;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn mark_rollback_failed(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.status = RunStatus::RollbackFailed;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }

    pub fn outcomes_for(&self, phase_id: &PhaseId) -> Option<&[TaskOutcome]> {
        self.task_outcomes.get(phase_id).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Comparison, CriterionCategory, ValidationCriterion};

    fn outcome(task: &str, disposition: TaskDisposition, retries: u32) -> TaskOutcome {
        let now = chrono::Utc::now();
        TaskOutcome {
            task_id: TaskId::new(task),
            name: task.to_string(),
            disposition,
            retry_count: retries,
            error: match disposition {
                TaskDisposition::Succeeded => None,
                _ => Some("boom".to_string()),
            },
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_run_starts_running_with_fresh_id() {
        let run = ExecutionRun::new(PlanId::new("p1"));
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.id.as_uuid().is_nil());
        assert!(run.completed_at.is_none());
    }

    #[test]
    fn test_run_has_exactly_one_terminal_status() {
        let mut run = ExecutionRun::new(PlanId::new("p1"));
        run.succeed().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);

        // Any further transition is rejected
        assert!(run.fail().is_err());
        assert!(run.mark_rolled_back().is_err());
        assert!(run.mark_rollback_failed().is_err());
        assert_eq!(run.status, RunStatus::Succeeded);
    }

    #[test]
    fn test_partial_progress_is_retained() {
        let mut run = ExecutionRun::new(PlanId::new("p1"));
        run.begin_phase(PhaseId::new("build")).unwrap();
        run.complete_phase(PhaseId::new("build")).unwrap();
        run.begin_phase(PhaseId::new("deploy")).unwrap();
        run.record_error("task d1 failed after 3 attempt(s): boom");
        run.mark_rolled_back().unwrap();

        assert_eq!(run.completed_phases, vec![PhaseId::new("build")]);
        assert_eq!(run.current_phase, Some(PhaseId::new("deploy")));
        assert_eq!(run.errors.len(), 1);
    }

    #[test]
    fn test_phase_result_failure_prefers_first_dispatched_task() {
        let mut result = PhaseResult::new(PhaseId::new("deploy"));
        result.outcomes.push(outcome("t1", TaskDisposition::Succeeded, 0));
        result.outcomes.push(outcome("t2", TaskDisposition::Failed, 2));
        result.outcomes.push(outcome("t3", TaskDisposition::TimedOut, 1));

        match result.failure() {
            Some(DomainError::TaskFailed { task, attempts, .. }) => {
                assert_eq!(task, "t2");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn test_phase_result_breaches_fail_a_phase_with_green_tasks() {
        let criterion = ValidationCriterion::new(
            CriterionCategory::Health,
            "availability",
            Comparison::AtLeast,
            99.9,
        );

        let mut result = PhaseResult::new(PhaseId::new("validate"));
        result.outcomes.push(outcome("t1", TaskDisposition::Succeeded, 0));
        result.breaches.push(Breach::new(&criterion, Some(97.2)));

        assert!(!result.is_success());
        assert!(matches!(
            result.failure(),
            Some(DomainError::ValidationBreach(breaches)) if breaches.len() == 1
        ));
    }

    #[test]
    fn test_cancelled_tasks_are_not_failures() {
        let mut result = PhaseResult::new(PhaseId::new("deploy"));
        result.outcomes.push(outcome("t1", TaskDisposition::Cancelled, 0));

        assert!(result.failure().is_none());
        // but the phase is not a success either
        assert!(!result.is_success());
    }
}
