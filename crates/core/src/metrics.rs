//! Metrics Domain Types
//!
//! Periodic health samples and the bounded rolling history that retains
//! them. The category set inside a sample is a configuration detail of the
//! registered sources, not an invariant of the engine.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// One timestamped bag of measured values, nested category -> metric -> value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSample {
    pub timestamp: DateTime<Utc>,
    pub categories: HashMap<String, HashMap<String, f64>>,
}

impl MetricsSample {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            categories: HashMap::new(),
        }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn insert(&mut self, category: impl Into<String>, metric: impl Into<String>, value: f64) {
        self.categories
            .entry(category.into())
            .or_default()
            .insert(metric.into(), value);
    }

    pub fn with_value(
        mut self,
        category: impl Into<String>,
        metric: impl Into<String>,
        value: f64,
    ) -> Self {
        self.insert(category, metric, value);
        self
    }

    pub fn get(&self, category: &str, metric: &str) -> Option<f64> {
        self.categories
            .get(category)
            .and_then(|metrics| metrics.get(metric))
            .copied()
    }

    /// Fold a partial sample from another source into this one. Later
    /// values win per metric; the merged timestamp is the most recent.
    pub fn merge(&mut self, other: MetricsSample) {
        if other.timestamp > self.timestamp {
            self.timestamp = other.timestamp;
        }
        for (category, metrics) in other.categories {
            let target = self.categories.entry(category).or_default();
            for (metric, value) in metrics {
                target.insert(metric, value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|m| m.is_empty())
    }

    /// Flatten into the `category.metric` keyed view the validation gate
    /// evaluates against.
    pub fn flatten(&self) -> MetricsSnapshot {
        let mut values = HashMap::new();
        for (category, metrics) in &self.categories {
            for (metric, value) in metrics {
                values.insert(format!("{}.{}", category, metric), *value);
            }
        }
        MetricsSnapshot {
            timestamp: self.timestamp,
            values,
        }
    }
}

/// Flat read-only view over one sample, keyed `category.metric`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    values: HashMap<String, f64>,
}

impl MetricsSnapshot {
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            values: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Fixed-capacity rolling history of samples, FIFO eviction
///
/// The one structure with concurrent writers (collector tick) and readers
/// (dashboard queries); reads return copies taken under the internal lock.
#[derive(Debug)]
pub struct MetricsRingBuffer {
    capacity: usize,
    inner: Mutex<VecDeque<MetricsSample>>,
}

impl MetricsRingBuffer {
    /// 24 hours of history at the default 30s sampling interval
    pub const DEFAULT_CAPACITY: usize = 2_880;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, evicting the oldest once the buffer is full
    pub fn append(&self, sample: MetricsSample) {
        let mut inner = self.inner.lock();
        if inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(sample);
    }

    /// The most recently appended sample
    pub fn latest(&self) -> Option<MetricsSample> {
        self.inner.lock().back().cloned()
    }

    /// Ordered copy of the retained history, oldest first
    pub fn snapshot(&self) -> Vec<MetricsSample> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for MetricsRingBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
