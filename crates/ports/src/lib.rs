//! Ports - Abstraction Layer
//!
//! This crate defines ports (traits) that represent the interfaces
//! needed by the application layer. These are implemented by adapters
//! or injected by the caller; all concrete behavior behind them is out
//! of the engine's scope.

pub mod event_bus;
pub mod executor;
pub mod metrics_source;
pub mod rollback;
pub mod store;

pub use crate::event_bus::{
    EventBusError, EventPublisher, EventReceiver, EventSubscriber, SystemEvent,
};
pub use crate::executor::{Executor, ExecutorError, TaskContext};
pub use crate::metrics_source::{MetricsSource, MetricsSourceError};
pub use crate::rollback::{RollbackError, RollbackStrategy};
pub use crate::store::{MetricsStore, RunStore, StoreError};
