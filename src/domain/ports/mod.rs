//! Port contracts and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod cache;
mod document;
mod factory;
mod lifecycle;
mod metrics;
mod queue;
mod relational;

pub use cache::{Cache, CacheError};
pub use document::{DocumentError, DocumentStore, UpsertOutcome};
#[cfg(test)]
pub use factory::MockBackendFactory;
pub use factory::{BackendFactory, BackendUnavailableError, ConstructedAdapter, PortHandle};
pub use lifecycle::{AdapterLifecycle, DrainOutcome, ProbeError};
pub use metrics::{MetricsError, NoOpPortMetrics, OperationOutcome, PortMetrics};
pub use queue::{LeasedTask, QueueError, Receipt, TaskId, TaskQueue};
pub use relational::{EmptySqlText, Record, RelationalError, RelationalStore, SqlText};
