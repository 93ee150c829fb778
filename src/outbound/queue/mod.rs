//! Task queue adapter over Redis lists.
//!
//! Tasks are JSON envelopes on a ready list. Leasing moves an envelope
//! atomically onto a pending list (`RPOPLPUSH`), and acknowledgement
//! removes it from pending (`LREM`). An unacknowledged envelope stays on
//! the pending list, where a broker-side reaper can requeue it; that
//! redelivery loop is outside this adapter.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{PooledConnection, RunError};
use bb8_redis::redis::{self, AsyncCommands};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    AdapterLifecycle, BackendUnavailableError, DrainOutcome, LeasedTask, ProbeError, QueueError,
    Receipt, TaskId, TaskQueue,
};

use super::redis_support::{self, RedisPool};
use super::wait_for_pool_drain;

const DEFAULT_QUEUE: &str = "tasks";

/// Wire form of a queued task.
#[derive(Debug, Serialize, Deserialize)]
struct TaskEnvelope {
    id: String,
    kind: String,
    payload: Value,
}

/// Queue adapter bound to one Redis connection pool.
pub struct RedisTaskQueue {
    logical_name: String,
    ready_key: String,
    pending_key: String,
    pool: RedisPool,
}

impl RedisTaskQueue {
    /// Build the pool described by `descriptor`. The `queue` parameter
    /// names the list pair; absent, a shared default is used.
    pub async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        let queue = descriptor.param("queue").unwrap_or(DEFAULT_QUEUE);
        Ok(Self {
            logical_name: descriptor.logical_name().to_string(),
            ready_key: format!("{queue}:ready"),
            pending_key: format!("{queue}:pending"),
            pool: redis_support::build_pool(descriptor).await?,
        })
    }

    async fn checkout(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, QueueError> {
        self.pool.get().await.map_err(|e| match e {
            RunError::TimedOut => QueueError::pool_exhausted(&self.logical_name),
            RunError::User(cause) => QueueError::backend(&self.logical_name, cause.to_string()),
        })
    }

    fn backend(&self, error: redis::RedisError) -> QueueError {
        QueueError::backend(&self.logical_name, error.to_string())
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, kind: &str, payload: &Value) -> Result<TaskId, QueueError> {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            payload: payload.clone(),
        };
        let encoded = serde_json::to_string(&envelope)
            .map_err(|e| QueueError::serialization(&self.logical_name, e.to_string()))?;

        let mut conn = self.checkout().await?;
        conn.lpush::<_, _, ()>(&self.ready_key, &encoded)
            .await
            .map_err(|e| self.backend(e))?;
        Ok(TaskId::new(envelope.id))
    }

    async fn lease(&self) -> Result<Option<LeasedTask>, QueueError> {
        let mut conn = self.checkout().await?;
        let moved: Option<String> = conn
            .rpoplpush(&self.ready_key, &self.pending_key)
            .await
            .map_err(|e| self.backend(e))?;
        let Some(raw) = moved else {
            return Ok(None);
        };

        let envelope: TaskEnvelope = serde_json::from_str(&raw)
            .map_err(|e| QueueError::serialization(&self.logical_name, e.to_string()))?;
        // The receipt is the exact list element, so acking can LREM it.
        Ok(Some(LeasedTask {
            id: TaskId::new(envelope.id),
            kind: envelope.kind,
            payload: envelope.payload,
            receipt: Receipt::new(raw),
        }))
    }

    async fn ack(&self, receipt: &Receipt) -> Result<(), QueueError> {
        let mut conn = self.checkout().await?;
        let removed: u64 = conn
            .lrem(&self.pending_key, 1, receipt.token())
            .await
            .map_err(|e| self.backend(e))?;
        if removed == 0 {
            return Err(QueueError::receipt_not_found(&self.logical_name));
        }
        Ok(())
    }
}

#[async_trait]
impl AdapterLifecycle for RedisTaskQueue {
    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Queue
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ProbeError::backend(&self.logical_name, e.to_string()))?;
        redis::cmd("PING")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| ProbeError::backend(&self.logical_name, e.to_string()))
    }

    async fn close(&self, drain: Duration) -> DrainOutcome {
        wait_for_pool_drain(drain, || redis_support::pool_is_idle(&self.pool)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn envelopes_round_trip_through_json() {
        let envelope = TaskEnvelope {
            id: "0192f0c1-2e6a-7c3b-9d4e-5f6a7b8c9d0e".to_string(),
            kind: "send_welcome_email".to_string(),
            payload: json!({ "user_id": 42 }),
        };

        let encoded = serde_json::to_string(&envelope).expect("encodes");
        let decoded: TaskEnvelope = serde_json::from_str(&encoded).expect("decodes");

        assert_eq!(decoded.id, envelope.id);
        assert_eq!(decoded.kind, envelope.kind);
        assert_eq!(decoded.payload, envelope.payload);
    }

    #[rstest]
    fn malformed_envelopes_surface_as_serialization_errors() {
        let result: Result<TaskEnvelope, _> = serde_json::from_str("{\"id\": 7}");
        assert!(result.is_err());
    }
}
