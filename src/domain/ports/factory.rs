//! Construction seam between descriptors and live adapters.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendDescriptor, BackendKind, PortFamily};

use super::{AdapterLifecycle, Cache, DocumentStore, RelationalStore, TaskQueue};

/// Clonable view of an adapter's port, one variant per family.
///
/// Ports are views: the registry holds the only strong ownership of each
/// adapter; handles resolved by callers are `Arc` clones that let in-flight
/// work drain after a swap.
#[derive(Clone)]
pub enum PortHandle {
    Relational(Arc<dyn RelationalStore>),
    Document(Arc<dyn DocumentStore>),
    Cache(Arc<dyn Cache>),
    Queue(Arc<dyn TaskQueue>),
}

impl PortHandle {
    /// The family this handle serves.
    pub fn family(&self) -> PortFamily {
        match self {
            Self::Relational(_) => PortFamily::Relational,
            Self::Document(_) => PortFamily::Document,
            Self::Cache(_) => PortFamily::Cache,
            Self::Queue(_) => PortFamily::Queue,
        }
    }
}

/// A freshly built adapter: its port view plus its lifecycle surface.
///
/// Both handles reference the same underlying adapter object.
#[derive(Clone)]
pub struct ConstructedAdapter {
    pub port: PortHandle,
    pub lifecycle: Arc<dyn AdapterLifecycle>,
}

/// Construction or validation failure for one backend.
///
/// Fatal at startup; reported with its cause chain when a runtime swap
/// fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backend '{logical_name}' ({kind}) unavailable after {attempts} attempt(s): {cause}")]
pub struct BackendUnavailableError {
    pub logical_name: String,
    pub kind: BackendKind,
    pub attempts: u32,
    pub cause: String,
}

impl BackendUnavailableError {
    /// Single-attempt constructor used by adapters; the registry rewrites
    /// the attempt count once its retry budget is spent.
    pub fn new(
        descriptor: &BackendDescriptor,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            logical_name: descriptor.logical_name().to_string(),
            kind: descriptor.kind(),
            attempts: 1,
            cause: cause.into(),
        }
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Factory turning a descriptor into a live adapter.
///
/// The registry depends on this seam rather than on concrete adapters so
/// lifecycle behaviour is testable without real backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Build the adapter for `descriptor`, including its pool. The liveness
    /// probe and retry budget are the registry's responsibility.
    async fn build(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<ConstructedAdapter, BackendUnavailableError>;
}
