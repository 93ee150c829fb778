//! Cache adapter over Redis with bb8 pooling.
//!
//! Every failure maps to `Unavailable` or `PoolExhausted` so callers can
//! treat the cache as optional and fall through to the source of truth.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{PooledConnection, RunError};
use bb8_redis::redis::{self, AsyncCommands};

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    AdapterLifecycle, BackendUnavailableError, Cache, CacheError, DrainOutcome, ProbeError,
};

use super::redis_support::{self, RedisPool};
use super::wait_for_pool_drain;

/// Cache adapter bound to one Redis connection pool.
pub struct RedisCache {
    logical_name: String,
    pool: RedisPool,
}

impl RedisCache {
    /// Build the pool described by `descriptor`.
    pub async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        Ok(Self {
            logical_name: descriptor.logical_name().to_string(),
            pool: redis_support::build_pool(descriptor).await?,
        })
    }

    async fn checkout(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, CacheError> {
        self.pool.get().await.map_err(|e| match e {
            RunError::TimedOut => CacheError::pool_exhausted(&self.logical_name),
            RunError::User(cause) => {
                CacheError::unavailable(&self.logical_name, cause.to_string())
            }
        })
    }

    fn unavailable(&self, error: redis::RedisError) -> CacheError {
        CacheError::unavailable(&self.logical_name, error.to_string())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.checkout().await?;
        conn.get(key).await.map_err(|e| self.unavailable(e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.checkout().await?;
        match ttl {
            // SET EX rejects a zero expiry; clamp to the smallest window.
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(|e| self.unavailable(e))
            }
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| self.unavailable(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.checkout().await?;
        conn.del::<_, u64>(key)
            .await
            .map(|_| ())
            .map_err(|e| self.unavailable(e))
    }
}

#[async_trait]
impl AdapterLifecycle for RedisCache {
    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cache
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
