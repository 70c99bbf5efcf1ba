//! Event Bus Port - In-process lifecycle event communication
//!
//! Defines interfaces for the in-memory publish/subscribe bus that decouples
//! observers (reporting, alerting) from execution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollout_core::execution::RunId;
use rollout_core::metrics::MetricsSample;
use rollout_core::plan::{PhaseId, PlanId};
use std::sync::Arc;

/// Lifecycle events published by the engine (Arc payloads for cheap cloning)
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// A run left the registry and started executing
    RunStarted { run_id: RunId, plan_id: PlanId },

    /// Every phase completed and validated
    RunCompleted { run_id: RunId, plan_id: PlanId },

    /// The run reached a non-success terminal status
    RunFailed {
        run_id: RunId,
        plan_id: PlanId,
        error: String,
    },

    /// Compensating actions completed after a phase failure
    RunRolledBack {
        run_id: RunId,
        plan_id: PlanId,
        failed_phase: PhaseId,
    },

    /// The rollback itself failed; operator escalation required
    RollbackFailed {
        run_id: RunId,
        plan_id: PlanId,
        error: String,
    },

    /// A phase began dispatching its tasks
    PhaseStarted { run_id: RunId, phase_id: PhaseId },

    /// All tasks settled and the validation criteria passed
    PhaseCompleted { run_id: RunId, phase_id: PhaseId },

    /// A task exhausted its retries or a criterion breached
    PhaseFailed {
        run_id: RunId,
        phase_id: PhaseId,
        error: String,
    },

    /// The collector appended a merged sample (zero-copy via Arc)
    MetricsCollected {
        timestamp: DateTime<Utc>,
        sample: Arc<MetricsSample>,
    },

    /// A dependency's circuit opened
    CircuitOpened { dependency: String },

    /// A dependency's circuit moved to the half-open trial
    CircuitHalfOpen { dependency: String },

    /// A dependency's circuit closed after a successful trial
    CircuitClosed { dependency: String },
}

impl SystemEvent {
    /// Stable event name subscribers can filter on
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::RunCompleted { .. } => "run.completed",
            Self::RunFailed { .. } => "run.failed",
            Self::RunRolledBack { .. } => "run.rolled_back",
            Self::RollbackFailed { .. } => "rollback.failed",
            Self::PhaseStarted { .. } => "phase.started",
            Self::PhaseCompleted { .. } => "phase.completed",
            Self::PhaseFailed { .. } => "phase.failed",
            Self::MetricsCollected { .. } => "metrics.collected",
            Self::CircuitOpened { .. } => "circuit.opened",
            Self::CircuitHalfOpen { .. } => "circuit.half_open",
            Self::CircuitClosed { .. } => "circuit.closed",
        }
    }
}

/// Event bus error types
#[derive(thiserror::Error, Debug)]
pub enum EventBusError {
    #[error("bus full (capacity: {0})")]
    Full(usize),

    #[error("subscriber dropped")]
    Dropped,

    #[error("channel closed")]
    Closed,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: SystemEvent) -> Result<(), EventBusError>;

    async fn publish_batch(&self, events: Vec<SystemEvent>) -> Result<(), EventBusError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// Event receiver wrapper
#[derive(Debug)]
pub struct EventReceiver {
    pub receiver: tokio::sync::broadcast::Receiver<SystemEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<SystemEvent, EventBusError> {
        self.receiver
            .recv()
            .await
            .map_err(|_| EventBusError::Dropped)
    }

    pub fn try_recv(&mut self) -> Result<SystemEvent, EventBusError> {
        self.receiver.try_recv().map_err(|_| EventBusError::Dropped)
    }
}

/// Event subscriber port
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self) -> Result<EventReceiver, EventBusError>;
}
