//! Deployment Orchestrator Service
//!
//! Owns the plan registry, walks phases in dependency order and coordinates
//! the phase executor, validation gate and rollback controller. Lifecycle
//! events are published through the injected bus; run records go to the
//! injected run store and are read back as snapshots.

use crate::phase_executor::PhaseExecutor;
use crate::rollback::RollbackController;
use parking_lot::RwLock;
use rollout_core::execution::{ExecutionRun, RunId};
use rollout_core::plan::{DeploymentPlan, Phase, PhaseId, PlanId};
use rollout_core::{DomainError, Result};
use rollout_ports::event_bus::{EventPublisher, SystemEvent};
use rollout_ports::store::RunStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives registered plans through their phases
pub struct DeploymentOrchestrator {
    plans: RwLock<HashMap<PlanId, Arc<DeploymentPlan>>>,
    phase_executor: Arc<PhaseExecutor>,
    rollback: Arc<RollbackController>,
    run_store: Arc<dyn RunStore>,
    events: Arc<dyn EventPublisher>,
}

impl DeploymentOrchestrator {
    pub fn new(
        phase_executor: Arc<PhaseExecutor>,
        rollback: Arc<RollbackController>,
        run_store: Arc<dyn RunStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
            phase_executor,
            rollback,
            run_store,
            events,
        }
    }

    /// Register an immutable plan. Malformed dependency graphs (unknown
    /// references, cycles) are rejected here, never at run time.
    pub fn register(&self, plan: DeploymentPlan) -> Result<()> {
        execution_order(&plan)?;

        let mut plans = self.plans.write();
        if plans.contains_key(&plan.id) {
            return Err(DomainError::DuplicatePlan(plan.id.to_string()));
        }

        info!(plan_id = %plan.id, phases = plan.phases.len(), "plan registered");
        plans.insert(plan.id.clone(), Arc::new(plan));
        Ok(())
    }

    /// Whether a plan id is currently registered
    pub fn is_registered(&self, plan_id: &PlanId) -> bool {
        self.plans.read().contains_key(plan_id)
    }

    /// Execute a registered plan as a fresh, independent run.
    ///
    /// Phase and validation failures end the run with a rollback and a
    /// `rolled_back` (or `rollback_failed`) status on the returned record;
    /// `Err` is reserved for unknown plans and infrastructure faults.
    pub async fn run(&self, plan_id: &PlanId) -> Result<ExecutionRun> {
        let plan = self
            .plans
            .read()
            .get(plan_id)
            .cloned()
            .ok_or_else(|| DomainError::PlanNotFound(plan_id.to_string()))?;

        let order = execution_order(&plan)?;
        let mut run = ExecutionRun::new(plan.id.clone());
        self.save(&run).await?;

        info!(run_id = %run.id, plan_id = %plan.id, phases = order.len(), "run started");
        self.publish(SystemEvent::RunStarted {
            run_id: run.id,
            plan_id: plan.id.clone(),
        })
        .await;

        for phase_id in order {
            let phase = plan.phase(&phase_id).ok_or_else(|| {
                DomainError::Validation(format!("phase {} vanished from plan", phase_id))
            })?;

            run.begin_phase(phase.id.clone())?;
            self.publish(SystemEvent::PhaseStarted {
                run_id: run.id,
                phase_id: phase.id.clone(),
            })
            .await;

            let result = self.phase_executor.execute(run.id, phase).await;
            run.record_phase_result(&result);

            match result.failure() {
                None => {
                    run.complete_phase(phase.id.clone())?;
                    self.save(&run).await?;
                    self.publish(SystemEvent::PhaseCompleted {
                        run_id: run.id,
                        phase_id: phase.id.clone(),
                    })
                    .await;
                }
                Some(failure) => {
                    warn!(run_id = %run.id, phase = %phase.id, error = %failure, "phase failed");
                    run.record_error(failure.to_string());
                    self.publish(SystemEvent::PhaseFailed {
                        run_id: run.id,
                        phase_id: phase.id.clone(),
                        error: failure.to_string(),
                    })
                    .await;

                    self.conclude_failed(&mut run, &plan, phase, &failure).await?;
                    return Ok(run);
                }
            }
        }

        run.succeed()?;
        self.save(&run).await?;
        info!(run_id = %run.id, plan_id = %plan.id, "run completed");
        self.publish(SystemEvent::RunCompleted {
            run_id: run.id,
            plan_id: plan.id.clone(),
        })
        .await;

        Ok(run)
    }

    /// Snapshot of a run by id, usable after completion
    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<ExecutionRun>> {
        self.run_store
            .get_run(run_id)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))
    }

    /// Snapshots of every run of a plan, oldest first
    pub async fn list_runs(&self, plan_id: &PlanId) -> Result<Vec<ExecutionRun>> {
        self.run_store
            .list_runs(plan_id)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))
    }

    /// Roll the run back and settle its terminal status
    async fn conclude_failed(
        &self,
        run: &mut ExecutionRun,
        plan: &DeploymentPlan,
        failed_phase: &Phase,
        failure: &DomainError,
    ) -> Result<()> {
        match self
            .rollback
            .rollback(run, &plan.rollback_strategy, failed_phase)
            .await
        {
            Ok(()) => {
                run.mark_rolled_back()?;
                self.publish(SystemEvent::RunRolledBack {
                    run_id: run.id,
                    plan_id: plan.id.clone(),
                    failed_phase: failed_phase.id.clone(),
                })
                .await;
            }
            Err(rollback_error) => {
                error!(
                    run_id = %run.id,
                    error = %rollback_error,
                    "rollback failed, escalating"
                );
                run.record_error(rollback_error.to_string());
                run.mark_rollback_failed()?;
                self.publish(SystemEvent::RollbackFailed {
                    run_id: run.id,
                    plan_id: plan.id.clone(),
                    error: rollback_error.to_string(),
                })
                .await;
            }
        }

        self.save(run).await?;
        self.publish(SystemEvent::RunFailed {
            run_id: run.id,
            plan_id: plan.id.clone(),
            error: failure.to_string(),
        })
        .await;
        Ok(())
    }

    async fn save(&self, run: &ExecutionRun) -> Result<()> {
        self.run_store
            .save_run(run)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))
    }

    async fn publish(&self, event: SystemEvent) {
        if let Err(err) = self.events.publish(event).await {
            warn!(error = %err, "failed to publish event");
        }
    }
}

/// Dependency-respecting execution order over the plan's phases.
///
/// Kahn's algorithm with a deterministic tie-break: among ready phases the
/// lowest `order` wins, then the lexicographically smallest id. A cycle is
/// an `InvalidPlan` error, never a guess.
pub fn execution_order(plan: &DeploymentPlan) -> Result<Vec<PhaseId>> {
    plan.validate()?;

    let mut indegree: HashMap<&PhaseId, usize> = plan
        .phases
        .iter()
        .map(|p| (&p.id, p.depends_on.len()))
        .collect();

    let mut dependents: HashMap<&PhaseId, Vec<&Phase>> = HashMap::new();
    for phase in &plan.phases {
        for dep in &phase.depends_on {
            dependents.entry(dep).or_default().push(phase);
        }
    }

    let mut ready: Vec<&Phase> = plan
        .phases
        .iter()
        .filter(|p| indegree[&p.id] == 0)
        .collect();

    let mut ordered = Vec::with_capacity(plan.phases.len());
    while !ready.is_empty() {
        ready.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        let phase = ready.remove(0);
        ordered.push(phase.id.clone());

        if let Some(children) = dependents.get(&phase.id) {
            for child in children {
                let remaining = indegree
                    .get_mut(&child.id)
                    .map(|count| {
                        *count -= 1;
                        *count
                    })
                    .unwrap_or(0);
                if remaining == 0 {
                    ready.push(child);
                }
            }
        }
    }

    if ordered.len() != plan.phases.len() {
        let stuck: Vec<String> = plan
            .phases
            .iter()
            .filter(|p| !ordered.contains(&p.id))
            .map(|p| p.id.to_string())
            .collect();
        return Err(DomainError::InvalidPlan(format!(
            "dependency cycle among phases: {}",
            stuck.join(", ")
        )));
    }

    Ok(ordered)
}
