//! Port contract for at-least-once task dispatch.
//!
//! A task is not considered delivered until the consumer acknowledges its
//! receipt; redelivery of unacknowledged tasks within a lease window is
//! the broker's responsibility, not re-implemented here.

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by queue adapters.
    pub enum QueueError {
        /// The broker rejected or failed the operation.
        Backend { logical_name: String, message: String } => "queue '{logical_name}': {message}",
        /// The pool ceiling was reached within the connect timeout.
        PoolExhausted { logical_name: String } => "queue '{logical_name}': connection pool exhausted",
        /// A task envelope could not be encoded or decoded.
        Serialization { logical_name: String, message: String } => "queue '{logical_name}': envelope serialization failed: {message}",
        /// The acknowledged receipt is not currently leased.
        ReceiptNotFound { logical_name: String } => "queue '{logical_name}': receipt not found among leased tasks",
    }
}

/// Identifier assigned to a task when it is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an identifier. Adapters mint these; consumers treat them as
    /// opaque.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque handle proving possession of a leased task; required to ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt(String);

impl Receipt {
    /// Wrap an adapter-defined receipt token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, meaningful only to the adapter that issued it.
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// A task handed to a consumer, pending acknowledgement.
#[derive(Debug, Clone)]
pub struct LeasedTask {
    pub id: TaskId,
    pub kind: String,
    pub payload: Value,
    pub receipt: Receipt,
}

/// Capability contract for task queues.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task for asynchronous processing. At-least-once delivery.
    async fn enqueue(&self, kind: &str, payload: &Value) -> Result<TaskId, QueueError>;

    /// Lease the next available task, if any.
    async fn lease(&self) -> Result<Option<LeasedTask>, QueueError>;

    /// Acknowledge a leased task, marking it delivered.
    async fn ack(&self, receipt: &Receipt) -> Result<(), QueueError>;
}
