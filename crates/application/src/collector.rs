//! Metrics Collector Service
//!
//! Background loop that pulls one partial sample from every registered
//! source on a fixed interval, merges them, appends to the bounded ring
//! buffer and publishes a `metrics.collected` event. Stopping the collector
//! is explicit and idempotent; the timer task never leaks.

use crate::config::CollectorConfig;
use parking_lot::Mutex;
use rollout_core::metrics::{MetricsRingBuffer, MetricsSample};
use rollout_ports::event_bus::{EventPublisher, SystemEvent};
use rollout_ports::metrics_source::MetricsSource;
use rollout_ports::store::MetricsStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Periodic health sampler with a capped rolling history
pub struct MetricsCollector {
    config: CollectorConfig,
    sources: Vec<Arc<dyn MetricsSource>>,
    buffer: Arc<MetricsRingBuffer>,
    events: Arc<dyn EventPublisher>,
    store: Option<Arc<dyn MetricsStore>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsCollector {
    pub fn new(config: CollectorConfig, events: Arc<dyn EventPublisher>) -> Self {
        let buffer = Arc::new(MetricsRingBuffer::new(config.buffer_capacity));
        Self {
            config,
            sources: Vec::new(),
            buffer,
            events,
            store: None,
            handle: Mutex::new(None),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Optional durable sink for every collected sample
    pub fn with_store(mut self, store: Arc<dyn MetricsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Shared handle to the rolling history (consumed by the gate and
    /// dashboard queries)
    pub fn buffer(&self) -> Arc<MetricsRingBuffer> {
        self.buffer.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Spawn the sampling loop. Starting an already running collector is a
    /// no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            warn!("metrics collector already running");
            return;
        }

        let sources = self.sources.clone();
        let buffer = self.buffer.clone();
        let events = self.events.clone();
        let store = self.store.clone();
        let interval = self.config.interval;
        let source_timeout = self.config.source_timeout;

        info!(interval_ms = interval.as_millis() as u64, sources = sources.len(), "metrics collector started");
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                tick(&sources, source_timeout, &buffer, &events, store.as_ref()).await;
            }
        }));
    }

    /// Stop the sampling loop. Safe to call repeatedly; only the first call
    /// does anything.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            info!("metrics collector stopped");
        }
    }

    /// Run one collection cycle immediately, outside the timer
    pub async fn collect_now(&self) -> MetricsSample {
        tick(
            &self.sources,
            self.config.source_timeout,
            &self.buffer,
            &self.events,
            self.store.as_ref(),
        )
        .await
    }
}

impl Drop for MetricsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One collection cycle: sample every source, merge, append, publish
async fn tick(
    sources: &[Arc<dyn MetricsSource>],
    source_timeout: Duration,
    buffer: &MetricsRingBuffer,
    events: &Arc<dyn EventPublisher>,
    store: Option<&Arc<dyn MetricsStore>>,
) -> MetricsSample {
    let mut merged = MetricsSample::now();

    for source in sources {
        match tokio::time::timeout(source_timeout, source.sample()).await {
            Ok(Ok(partial)) => merged.merge(partial),
            Ok(Err(err)) => {
                warn!(source = source.name(), error = %err, "metrics source failed");
            }
            Err(_) => {
                warn!(source = source.name(), timeout_ms = source_timeout.as_millis() as u64, "metrics source timed out");
            }
        }
    }

    buffer.append(merged.clone());

    if let Some(store) = store {
        if let Err(err) = store.save_sample(&merged).await {
            warn!(error = %err, "failed to persist metrics sample");
        }
    }

    debug!(timestamp = %merged.timestamp, "metrics sample collected");
    if let Err(err) = events
        .publish(SystemEvent::MetricsCollected {
            timestamp: merged.timestamp,
            sample: Arc::new(merged.clone()),
        })
        .await
    {
        warn!(error = %err, "failed to publish metrics event");
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rollout_adapters::InMemoryBus;
    use rollout_ports::event_bus::EventSubscriber;
    use rollout_ports::metrics_source::MetricsSourceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn sample(&self) -> Result<MetricsSample, MetricsSourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MetricsSample::now().with_value("performance", "tick", call as f64))
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl MetricsSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn sample(&self) -> Result<MetricsSample, MetricsSourceError> {
            Err(MetricsSourceError::Unavailable("no scrape".to_string()))
        }
    }

    fn collector_with(sources: Vec<Arc<dyn MetricsSource>>) -> (MetricsCollector, Arc<InMemoryBus>) {
        let bus = Arc::new(InMemoryBus::new(64));
        let mut collector = MetricsCollector::new(
            CollectorConfig {
                interval: Duration::from_millis(10),
                buffer_capacity: 8,
                source_timeout: Duration::from_millis(50),
            },
            bus.clone(),
        );
        for source in sources {
            collector = collector.with_source(source);
        }
        (collector, bus)
    }

    #[tokio::test]
    async fn test_collect_now_merges_sources_and_appends() {
        let (collector, bus) = collector_with(vec![
            Arc::new(CountingSource::new()),
            Arc::new(BrokenSource),
        ]);
        let mut receiver = bus.subscribe().await.unwrap();

        let sample = collector.collect_now().await;

        assert_eq!(sample.get("performance", "tick"), Some(0.0));
        assert_eq!(collector.buffer().len(), 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "metrics.collected");
    }

    #[tokio::test]
    async fn test_interval_loop_fills_the_buffer() {
        let (collector, _bus) = collector_with(vec![Arc::new(CountingSource::new())]);

        collector.start();
        assert!(collector.is_running());
        tokio::time::sleep(Duration::from_millis(60)).await;
        collector.stop();

        assert!(collector.buffer().len() >= 2);
        let latest = collector.buffer().latest().unwrap();
        assert!(latest.get("performance", "tick").is_some());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (collector, _bus) = collector_with(vec![Arc::new(CountingSource::new())]);

        collector.start();
        collector.stop();
        assert!(!collector.is_running());

        // Second stop is a no-op, not a panic
        collector.stop();
        assert!(!collector.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_loop() {
        let (collector, _bus) = collector_with(vec![Arc::new(CountingSource::new())]);

        collector.start();
        collector.start();
        assert!(collector.is_running());
        collector.stop();
        assert!(!collector.is_running());
    }
}
