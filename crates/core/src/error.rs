//! Error types shared across the system

use crate::plan::Breach;
use thiserror::Error;

/// Base error type for the entire system
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("plan already registered: {0}")]
    DuplicatePlan(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("task {task} timed out after {attempts} attempt(s)")]
    TaskTimeout { task: String, attempts: u32 },

    #[error("task {task} failed after {attempts} attempt(s): {reason}")]
    TaskFailed {
        task: String,
        attempts: u32,
        reason: String,
    },

    #[error("{} validation criteria breached", .0.len())]
    ValidationBreach(Vec<Breach>),

    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    #[error("circuit open for dependency {0}")]
    CircuitOpen(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
