//! Domain Core - Deployment Orchestration Types
//!
//! This crate contains the domain entities, value objects and resilience
//! primitives of the deployment orchestration engine: plans, phases, tasks,
//! execution runs, the per-dependency circuit breaker and the bounded
//! metrics history.

pub mod circuit_breaker;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod plan;

pub use crate::error::DomainError;
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

// Re-export all types for easy importing
pub use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, TransitionHook,
};
pub use crate::execution::{
    ExecutionRun, PhaseResult, RunId, RunStatus, TaskDisposition, TaskOutcome,
};
pub use crate::metrics::{MetricsRingBuffer, MetricsSample, MetricsSnapshot};
pub use crate::plan::{
    Breach, Comparison, CriterionCategory, DeploymentPlan, Phase, PhaseId, PlanId, Task, TaskId,
    TaskKind, ValidationCriterion,
};

// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;
