//! In-memory store adapters
//!
//! Default implementations of the RunStore and MetricsStore ports. Readers
//! always get cloned snapshots; the live records stay private to the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollout_core::execution::{ExecutionRun, RunId};
use rollout_core::metrics::MetricsSample;
use rollout_core::plan::PlanId;
use std::collections::HashMap;
use tokio::sync::RwLock;

use rollout_ports::store::{MetricsStore, RunStore, StoreError};

/// In-memory execution run store
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<RunId, ExecutionRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save_run(&self, run: &ExecutionRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<ExecutionRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.get(id).cloned())
    }

    async fn list_runs(&self, plan_id: &PlanId) -> Result<Vec<ExecutionRun>, StoreError> {
        let runs = self.runs.read().await;
        let mut matching: Vec<ExecutionRun> = runs
            .values()
            .filter(|run| &run.plan_id == plan_id)
            .cloned()
            .collect();
        matching.sort_by_key(|run| run.started_at);
        Ok(matching)
    }
}

/// In-memory metrics history store
#[derive(Debug, Default)]
pub struct InMemoryMetricsStore {
    samples: RwLock<Vec<MetricsSample>>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn save_sample(&self, sample: &MetricsSample) -> Result<(), StoreError> {
        let mut samples = self.samples.write().await;
        samples.push(sample.clone());
        Ok(())
    }

    async fn query_samples(&self, since: DateTime<Utc>) -> Result<Vec<MetricsSample>, StoreError> {
        let samples = self.samples.read().await;
        Ok(samples
            .iter()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_store_round_trip() {
        let store = InMemoryRunStore::new();
        let run = ExecutionRun::new(PlanId::new("p1"));
        let id = run.id;

        store.save_run(&run).await.unwrap();
        let loaded = store.get_run(&id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.plan_id, PlanId::new("p1"));
    }

    #[tokio::test]
    async fn test_get_run_returns_a_snapshot() {
        let store = InMemoryRunStore::new();
        let run = ExecutionRun::new(PlanId::new("p1"));
        let id = run.id;
        store.save_run(&run).await.unwrap();

        // Mutating the returned value must not affect the stored record
        let mut snapshot = store.get_run(&id).await.unwrap().unwrap();
        snapshot.record_error("local mutation");

        let reloaded = store.get_run(&id).await.unwrap().unwrap();
        assert!(reloaded.errors.is_empty());
    }

    #[tokio::test]
    async fn test_list_runs_filters_by_plan() {
        let store = InMemoryRunStore::new();
        store
            .save_run(&ExecutionRun::new(PlanId::new("p1")))
            .await
            .unwrap();
        store
            .save_run(&ExecutionRun::new(PlanId::new("p1")))
            .await
            .unwrap();
        store
            .save_run(&ExecutionRun::new(PlanId::new("p2")))
            .await
            .unwrap();

        let runs = store.list_runs(&PlanId::new("p1")).await.unwrap();
        assert_eq!(runs.len(), 2);
    }

    #[tokio::test]
    async fn test_metrics_store_query_since() {
        let store = InMemoryMetricsStore::new();
        let old = MetricsSample::new(Utc::now() - chrono::Duration::hours(2));
        let recent = MetricsSample::now();
        store.save_sample(&old).await.unwrap();
        store.save_sample(&recent).await.unwrap();

        let found = store
            .query_samples(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
