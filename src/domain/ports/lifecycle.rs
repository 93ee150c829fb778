//! Lifecycle surface every adapter exposes to the registry.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::BackendKind;

use super::define_port_error;

define_port_error! {
    /// Liveness probe failures.
    pub enum ProbeError {
        /// The backend did not answer the probe round trip.
        Backend { logical_name: String, message: String } => "probe of '{logical_name}' failed: {message}",
    }
}

/// How an adapter shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// In-flight work finished within the drain window.
    Clean,
    /// The drain window elapsed and the adapter was force-closed.
    Forced,
}

impl DrainOutcome {
    pub fn is_clean(self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Construction, liveness, and teardown contract for adapters.
///
/// The registry is the only caller: it probes during startup, readiness
/// checks, and hot-swap validation, and closes adapters during `stop` and
/// after a swap.
#[async_trait]
pub trait AdapterLifecycle: Send + Sync {
    /// Logical name the adapter is registered under.
    fn logical_name(&self) -> &str;

    /// Backend kind the adapter was built from.
    fn kind(&self) -> BackendKind;

    /// Lightweight liveness round trip (`SELECT 1`, `PING`, ...).
    async fn probe(&self) -> Result<(), ProbeError>;

    /// Release the adapter's pool, draining in-flight work for at most
    /// `drain`. A forced close is reported, never hidden.
    async fn close(&self, drain: Duration) -> DrainOutcome;
}
