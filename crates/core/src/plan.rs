//! Deployment Plan Domain Entity
//!
//! This module contains the DeploymentPlan aggregate root and the value
//! objects that describe phases, tasks and validation criteria.

use crate::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plan identifier - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase identifier - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseId(String);

impl PhaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PhaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task identifier - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task kind discriminator - Value Object (Enum)
///
/// The kind selects which pluggable executor runs the task. The engine never
/// interprets the task beyond this dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Infrastructure,
    Application,
    Security,
    Testing,
    Monitoring,
}

impl TaskKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::Application => "application",
            Self::Security => "security",
            Self::Testing => "testing",
            Self::Monitoring => "monitoring",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task - Value Object
///
/// Smallest schedulable unit. The executor configuration stays an opaque
/// key-value map interpreted by the executor registered for the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub kind: TaskKind,
    pub config: serde_json::Map<String, serde_json::Value>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            config: serde_json::Map::new(),
            timeout_ms: 300_000, // 5 minutes default
            max_retries: 0,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Validation criterion category - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionCategory {
    Health,
    Performance,
    Security,
    Compliance,
}

impl CriterionCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Health => "health",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::Compliance => "compliance",
        }
    }
}

impl std::fmt::Display for CriterionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison direction for a threshold check - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// The measured value must be >= the threshold (e.g. availability).
    AtLeast,
    /// The measured value must be <= the threshold (e.g. latency).
    AtMost,
}

impl Comparison {
    pub fn holds(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Self::AtLeast => actual >= threshold,
            Self::AtMost => actual <= threshold,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AtLeast => "at least",
            Self::AtMost => "at most",
        }
    }
}

/// Validation criterion - Value Object
///
/// A named threshold check gating phase advancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCriterion {
    pub category: CriterionCategory,
    pub metric: String,
    pub threshold: f64,
    pub comparison: Comparison,
    pub timeout_ms: u64,
}

impl ValidationCriterion {
    pub fn new(
        category: CriterionCategory,
        metric: impl Into<String>,
        comparison: Comparison,
        threshold: f64,
    ) -> Self {
        Self {
            category,
            metric: metric.into(),
            threshold,
            comparison,
            timeout_ms: 5_000,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A single breached criterion, with the value actually observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breach {
    pub category: CriterionCategory,
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
    pub actual: Option<f64>,
}

impl Breach {
    pub fn new(criterion: &ValidationCriterion, actual: Option<f64>) -> Self {
        Self {
            category: criterion.category,
            metric: criterion.metric.clone(),
            comparison: criterion.comparison,
            threshold: criterion.threshold,
            actual,
        }
    }
}

impl std::fmt::Display for Breach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.actual {
            Some(actual) => write!(
                f,
                "{} [{}]: expected {} {}, got {}",
                self.metric,
                self.category,
                self.comparison.as_str(),
                self.threshold,
                actual
            ),
            None => write!(
                f,
                "{} [{}]: expected {} {}, metric missing",
                self.metric,
                self.category,
                self.comparison.as_str(),
                self.threshold
            ),
        }
    }
}

/// Phase - Value Object
///
/// A dependency-ordered group of tasks. A phase cannot start until every
/// phase it depends on has completed successfully in the same run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    pub order: u32,
    pub depends_on: Vec<PhaseId>,
    pub tasks: Vec<Task>,
    pub criteria: Vec<ValidationCriterion>,
    pub rollback_triggers: Vec<String>,
}

impl Phase {
    pub fn new(id: impl Into<PhaseId>, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
            depends_on: vec![],
            tasks: vec![],
            criteria: vec![],
            rollback_triggers: vec![],
        }
    }

    pub fn with_dependency(mut self, phase_id: impl Into<PhaseId>) -> Self {
        self.depends_on.push(phase_id.into());
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_criterion(mut self, criterion: ValidationCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_rollback_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.rollback_triggers.push(trigger.into());
        self
    }
}

/// Deployment plan aggregate root
///
/// Immutable once registered; the registry hands out shared references and
/// every run works against the same plan value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub id: PlanId,
    pub name: String,
    pub phases: Vec<Phase>,
    pub rollback_strategy: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DeploymentPlan {
    pub fn new(
        id: impl Into<PlanId>,
        name: impl Into<String>,
        rollback_strategy: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phases: vec![],
            rollback_strategy: rollback_strategy.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn phase(&self, id: &PhaseId) -> Option<&Phase> {
        self.phases.iter().find(|p| &p.id == id)
    }

    /// Validate internal consistency: unique phase ids, all dependencies
    /// resolvable inside the plan.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for phase in &self.phases {
            if !seen.insert(&phase.id) {
                return Err(DomainError::InvalidPlan(format!(
                    "duplicate phase id: {}",
                    phase.id
                )));
            }
        }

        for phase in &self.phases {
            for dep in &phase.depends_on {
                if self.phase(dep).is_none() {
                    return Err(DomainError::InvalidPlan(format!(
                        "phase {} depends on unknown phase {}",
                        phase.id, dep
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new("t1", "provision cluster", TaskKind::Infrastructure)
            .with_config("region", serde_json::json!("eu-west-1"))
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(2);

        assert_eq!(task.id.as_str(), "t1");
        assert_eq!(task.timeout(), Duration::from_secs(60));
        assert_eq!(task.max_retries, 2);
        assert_eq!(
            task.config.get("region"),
            Some(&serde_json::json!("eu-west-1"))
        );
    }

    #[test]
    fn test_comparison_directions() {
        assert!(Comparison::AtLeast.holds(99.9, 99.5));
        assert!(!Comparison::AtLeast.holds(99.0, 99.5));
        assert!(Comparison::AtMost.holds(120.0, 250.0));
        assert!(!Comparison::AtMost.holds(300.0, 250.0));
    }

    #[test]
    fn test_breach_display_includes_observed_value() {
        let criterion = ValidationCriterion::new(
            CriterionCategory::Performance,
            "latency_p95_ms",
            Comparison::AtMost,
            250.0,
        );
        let breach = Breach::new(&criterion, Some(310.0));

        let rendered = breach.to_string();
        assert!(rendered.contains("latency_p95_ms"));
        assert!(rendered.contains("310"));
    }

    #[test]
    fn test_plan_validate_rejects_unknown_dependency() {
        let plan = DeploymentPlan::new("p1", "release", "blue-green")
            .with_phase(Phase::new("build", "Build", 1).with_dependency("missing"));

        let result = plan.validate();
        assert!(matches!(result, Err(DomainError::InvalidPlan(_))));
    }

    #[test]
    fn test_plan_validate_rejects_duplicate_phase_id() {
        let plan = DeploymentPlan::new("p1", "release", "blue-green")
            .with_phase(Phase::new("build", "Build", 1))
            .with_phase(Phase::new("build", "Build again", 2));

        let result = plan.validate();
        assert!(matches!(result, Err(DomainError::InvalidPlan(_))));
    }

    #[test]
    fn test_plan_phase_lookup() {
        let plan = DeploymentPlan::new("p1", "release", "blue-green")
            .with_phase(Phase::new("build", "Build", 1))
            .with_phase(Phase::new("deploy", "Deploy", 2).with_dependency("build"));

        assert!(plan.phase(&PhaseId::new("deploy")).is_some());
        assert!(plan.phase(&PhaseId::new("nope")).is_none());
    }
}
