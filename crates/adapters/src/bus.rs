//! InMemoryBus adapter using tokio::broadcast
//!
//! This is the concrete implementation of the EventPublisher and
//! EventSubscriber ports. Events are cloned per subscriber; large payloads
//! travel behind Arc pointers.

use async_trait::async_trait;
use rollout_core::circuit_breaker::{CircuitState, TransitionHook};
use rollout_ports::event_bus::{
    EventBusError, EventPublisher, EventReceiver, EventSubscriber, SystemEvent,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// In-memory event bus for inter-component communication
///
/// Publishing never blocks: with no subscribers the event is dropped, which
/// matches the engine's fire-and-forget lifecycle notifications.
pub struct InMemoryBus {
    sender: broadcast::Sender<SystemEvent>,
    capacity: usize,
}

impl InMemoryBus {
    /// Create a new InMemoryBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Get the configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of attached receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish(&self, event: SystemEvent) -> Result<(), EventBusError> {
        debug!(event = event.event_type(), "publishing event");
        // A send error only means nobody is listening right now
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryBus {
    async fn subscribe(&self) -> Result<EventReceiver, EventBusError> {
        let receiver = self.sender.subscribe();
        Ok(EventReceiver { receiver })
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Builder pattern for InMemoryBus configuration
pub struct InMemoryBusBuilder {
    capacity: usize,
}

impl InMemoryBusBuilder {
    pub fn new() -> Self {
        Self { capacity: 10_000 }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> InMemoryBus {
        InMemoryBus::new(self.capacity)
    }
}

impl Default for InMemoryBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Glue a circuit breaker registry to the event bus: every state transition
/// becomes a `circuit.*` event. The hook is synchronous, so publication is
/// spawned onto the runtime.
pub fn circuit_transition_publisher(bus: Arc<dyn EventPublisher>) -> TransitionHook {
    Arc::new(move |dependency: &str, state: CircuitState| {
        let event = match state {
            CircuitState::Open => SystemEvent::CircuitOpened {
                dependency: dependency.to_string(),
            },
            CircuitState::HalfOpen => SystemEvent::CircuitHalfOpen {
                dependency: dependency.to_string(),
            },
            CircuitState::Closed => SystemEvent::CircuitClosed {
                dependency: dependency.to_string(),
            },
        };
        let bus = bus.clone();
        tokio::spawn(async move {
            let _ = bus.publish(event).await;
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_core::execution::RunId;
    use rollout_core::plan::{PhaseId, PlanId};

    fn phase_started() -> SystemEvent {
        SystemEvent::PhaseStarted {
            run_id: RunId::new(),
            phase_id: PhaseId::new("deploy"),
        }
    }

    #[tokio::test]
    async fn test_bus_creation() {
        let bus = InMemoryBus::new(1000);
        assert_eq!(bus.capacity(), 1000);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = InMemoryBus::new(100);

        // Subscribe before publishing
        let mut receiver = bus.subscribe().await.unwrap();

        bus.publish(phase_started()).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "phase.started");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = InMemoryBus::new(100);

        let mut receiver1 = bus.subscribe().await.unwrap();
        let mut receiver2 = bus.subscribe().await.unwrap();

        bus.publish(SystemEvent::RunStarted {
            run_id: RunId::new(),
            plan_id: PlanId::new("p1"),
        })
        .await
        .unwrap();

        assert_eq!(receiver1.recv().await.unwrap().event_type(), "run.started");
        assert_eq!(receiver2.recv().await.unwrap().event_type(), "run.started");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = InMemoryBus::new(100);
        assert!(bus.publish(phase_started()).await.is_ok());
    }

    #[tokio::test]
    async fn test_batch_publish_preserves_order() {
        let bus = InMemoryBus::new(100);
        let mut receiver = bus.subscribe().await.unwrap();

        let run_id = RunId::new();
        let plan_id = PlanId::new("p1");
        bus.publish_batch(vec![
            SystemEvent::RunStarted {
                run_id,
                plan_id: plan_id.clone(),
            },
            SystemEvent::RunCompleted {
                run_id,
                plan_id: plan_id.clone(),
            },
        ])
        .await
        .unwrap();

        assert_eq!(receiver.recv().await.unwrap().event_type(), "run.started");
        assert_eq!(
            receiver.recv().await.unwrap().event_type(),
            "run.completed"
        );
    }

    #[tokio::test]
    async fn test_builder_pattern() {
        let bus = InMemoryBusBuilder::new().capacity(5000).build();
        assert_eq!(bus.capacity(), 5000);
    }

    #[tokio::test]
    async fn test_circuit_transitions_reach_the_bus() {
        let bus = Arc::new(InMemoryBus::new(100));
        let mut receiver = bus.subscribe().await.unwrap();

        let hook = circuit_transition_publisher(bus.clone());
        hook("payments", CircuitState::Open);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "circuit.opened");
        match received {
            SystemEvent::CircuitOpened { dependency } => assert_eq!(dependency, "payments"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
