//! Adapters - Infrastructure Layer
//!
//! Concrete in-process implementations of the ports: the broadcast-backed
//! event bus, in-memory run and metrics stores, and the tracing bootstrap.

pub mod bus;
pub mod stores;
pub mod telemetry;

pub use crate::bus::{circuit_transition_publisher, InMemoryBus, InMemoryBusBuilder};
pub use crate::stores::{InMemoryMetricsStore, InMemoryRunStore};
pub use crate::telemetry::init_telemetry;
