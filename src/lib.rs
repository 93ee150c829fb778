//! Plugboard library modules.
//!
//! The crate wires interchangeable infrastructure backends behind stable
//! port contracts: relational stores (ORM, raw SQL, or YAML-declared
//! schema), a document store, a cache, and a task queue. Configuration
//! selects the backends; the [`registry::Registry`] owns their lifecycle
//! and hands out port views by logical name.

pub mod config;
pub mod domain;
pub mod outbound;
pub mod registry;
pub mod telemetry;

pub use config::{BackendDescriptor, BackendKind, ConfigurationError, RetryPolicy, Settings};
pub use outbound::LiveBackendFactory;
pub use registry::{
    ReadinessReport, Registry, RegistryOptions, ShutdownReport, StartError, SwapError,
    UnknownResourceError,
};
