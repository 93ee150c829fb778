//! Port surface for observability counters.
//!
//! The abstraction layer only defines the structure of what is observable
//! (operations, failures, pool state per logical name); the emission
//! mechanism is an external collaborator. Implementations may export to a
//! metrics backend, log structured output, or discard everything in tests.

use std::time::Duration;

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording metrics.
    pub enum MetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "metrics exporter failed: {message}",
    }
}

/// Outcome label attached to operation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Failure,
}

/// Metrics recording port for per-resource counters.
#[async_trait]
pub trait PortMetrics: Send + Sync {
    /// Record one operation against a logical resource.
    async fn record_operation(
        &self,
        logical_name: &str,
        outcome: OperationOutcome,
        latency: Duration,
    ) -> Result<(), MetricsError>;

    /// Record current pool utilization for a logical resource.
    async fn record_pool_state(
        &self,
        logical_name: &str,
        in_use: u32,
        max: u32,
    ) -> Result<(), MetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpPortMetrics;

#[async_trait]
impl PortMetrics for NoOpPortMetrics {
    async fn record_operation(
        &self,
        _logical_name: &str,
        _outcome: OperationOutcome,
        _latency: Duration,
    ) -> Result<(), MetricsError> {
        Ok(())
    }

    async fn record_pool_state(
        &self,
        _logical_name: &str,
        _in_use: u32,
        _max: u32,
    ) -> Result<(), MetricsError> {
        Ok(())
    }
}
