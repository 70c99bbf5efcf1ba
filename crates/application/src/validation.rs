//! Validation Gate Service
//!
//! Evaluates a phase's threshold criteria against the current metrics
//! snapshot. Every criterion is checked; the gate never short-circuits, so
//! callers can report all failing criteria at once.

use rollout_core::metrics::{MetricsRingBuffer, MetricsSample, MetricsSnapshot};
use rollout_core::plan::{Breach, ValidationCriterion};
use rollout_ports::metrics_source::MetricsSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Threshold gate over the live metrics history
pub struct ValidationGate {
    buffer: Arc<MetricsRingBuffer>,
    sources: Vec<Arc<dyn MetricsSource>>,
    default_timeout: Duration,
}

impl ValidationGate {
    pub fn new(buffer: Arc<MetricsRingBuffer>) -> Self {
        Self {
            buffer,
            sources: Vec::new(),
            default_timeout: Duration::from_secs(5),
        }
    }

    /// Source used for a live refresh when the history is still empty
    pub fn with_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Compare every criterion against the snapshot. Returns `(true, [])`
    /// only when nothing breached. A metric missing from the snapshot is a
    /// breach of its criterion.
    pub fn evaluate(
        &self,
        criteria: &[ValidationCriterion],
        snapshot: &MetricsSnapshot,
    ) -> (bool, Vec<Breach>) {
        let mut breaches = Vec::new();

        for criterion in criteria {
            match snapshot.get(&criterion.metric) {
                Some(actual) if criterion.comparison.holds(actual, criterion.threshold) => {
                    debug!(metric = %criterion.metric, actual, "criterion satisfied");
                }
                Some(actual) => {
                    warn!(
                        metric = %criterion.metric,
                        actual,
                        threshold = criterion.threshold,
                        "criterion breached"
                    );
                    breaches.push(Breach::new(criterion, Some(actual)));
                }
                None => {
                    warn!(metric = %criterion.metric, "criterion metric missing from snapshot");
                    breaches.push(Breach::new(criterion, None));
                }
            }
        }

        (breaches.is_empty(), breaches)
    }

    /// Snapshot the criteria will be evaluated against: the latest collected
    /// sample, or a live source refresh bounded by the largest criterion
    /// timeout when no history exists yet.
    pub async fn snapshot_for(&self, criteria: &[ValidationCriterion]) -> MetricsSnapshot {
        if criteria.is_empty() {
            return MetricsSnapshot::empty();
        }

        if let Some(sample) = self.buffer.latest() {
            return sample.flatten();
        }

        let budget = criteria
            .iter()
            .map(|c| c.timeout())
            .max()
            .unwrap_or(self.default_timeout);

        let mut merged = MetricsSample::now();
        for source in &self.sources {
            match tokio::time::timeout(budget, source.sample()).await {
                Ok(Ok(partial)) => merged.merge(partial),
                Ok(Err(err)) => {
                    warn!(source = source.name(), error = %err, "metrics source failed during validation refresh");
                }
                Err(_) => {
                    warn!(source = source.name(), "metrics source timed out during validation refresh");
                }
            }
        }
        merged.flatten()
    }
}
