//! Service configuration
//!
//! Explicit configuration structs passed into constructors; lifecycle is
//! caller-owned and there are no ambient defaults beyond `Default` impls.

use rollout_core::metrics::MetricsRingBuffer;
use std::time::Duration;

/// Configuration for the task runner
#[derive(Debug, Clone)]
pub struct TaskRunnerConfig {
    /// Fixed delay between retry attempts of a failed task
    pub retry_backoff: Duration,
}

impl Default for TaskRunnerConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Configuration for the phase executor
#[derive(Debug, Clone)]
pub struct PhaseExecutorConfig {
    /// Upper bound on concurrently running tasks within one phase.
    /// `None` means one concurrent unit per task in the phase.
    pub max_concurrent_tasks: Option<usize>,
}

impl Default for PhaseExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: None,
        }
    }
}

/// Configuration for the metrics collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Sampling interval
    pub interval: Duration,
    /// Ring buffer capacity (samples retained)
    pub buffer_capacity: usize,
    /// Budget for one source to answer a sample request
    pub source_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            buffer_capacity: MetricsRingBuffer::DEFAULT_CAPACITY,
            source_timeout: Duration::from_secs(5),
        }
    }
}
