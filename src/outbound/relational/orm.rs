//! ORM-mode relational adapter over `diesel-async`.
//!
//! Object mapping is applied at the row boundary: reads are wrapped in
//! `row_to_json` so every result row comes back as one mapped object,
//! regardless of the query's column list. Writes and transactions run
//! through Diesel's async connection machinery on a `bb8` pool.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, RunError};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    AdapterLifecycle, BackendUnavailableError, DrainOutcome, ProbeError, Record, RelationalError,
    RelationalStore, SqlText,
};

use super::{postgres_url, redact_url};

type DieselPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Result row carrier for `row_to_json`-wrapped queries.
#[derive(diesel::QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = diesel::sql_types::Json)]
    row: serde_json::Value,
}

/// Relational adapter in ORM mode, bound to one Diesel connection pool.
pub struct DieselRelationalAdapter {
    logical_name: String,
    pool: DieselPool,
}

impl DieselRelationalAdapter {
    /// Build the pool described by `descriptor`. Liveness is validated by
    /// the registry's probe, not here.
    pub async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        let url = postgres_url(descriptor)?;
        debug!(
            logical_name = descriptor.logical_name(),
            url = %redact_url(&url),
            "building diesel pool"
        );

        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        let min_idle = (descriptor.pool_min() > 0).then_some(descriptor.pool_min());
        let pool = Pool::builder()
            .max_size(descriptor.pool_max())
            .min_idle(min_idle)
            .connection_timeout(descriptor.connect_timeout())
            .build(manager)
            .await
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;

        Ok(Self {
            logical_name: descriptor.logical_name().to_string(),
            pool,
        })
    }

    async fn checkout(
        &self,
    ) -> Result<bb8::PooledConnection<'_, AsyncDieselConnectionManager<AsyncPgConnection>>, RelationalError>
    {
        self.pool.get().await.map_err(|e| match e {
            RunError::TimedOut => RelationalError::pool_exhausted(&self.logical_name),
            RunError::User(cause) => {
                RelationalError::backend(&self.logical_name, cause.to_string())
            }
        })
    }
}

#[async_trait]
impl RelationalStore for DieselRelationalAdapter {
    async fn read(&self, query: &SqlText) -> Result<Vec<Record>, RelationalError> {
        let mut conn = self.checkout().await?;
        // A trailing semicolon would break the subquery wrapping.
        let inner = query
            .as_str()
            .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
        let wrapped = format!("SELECT row_to_json(mapped) AS row FROM ({inner}) AS mapped");
        let rows: Vec<JsonRow> = diesel::sql_query(wrapped)
            .load(&mut *conn)
            .await
            .map_err(|e| RelationalError::backend(&self.logical_name, e.to_string()))?;

        rows.into_iter()
            .map(|row| match row.row {
                serde_json::Value::Object(record) => Ok(record),
                other => Err(RelationalError::decode(
                    &self.logical_name,
                    format!("expected a mapped object, got {other}"),
                )),
            })
            .collect()
    }

    async fn write(&self, statement: &SqlText) -> Result<u64, RelationalError> {
        let mut conn = self.checkout().await?;
        let affected = diesel::sql_query(statement.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| RelationalError::backend(&self.logical_name, e.to_string()))?;
        Ok(affected as u64)
    }

    async fn transaction(&self, statements: &[SqlText]) -> Result<(), RelationalError> {
        let mut conn = self.checkout().await?;
        let conn = &mut *conn;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                for statement in statements {
                    diesel::sql_query(statement.as_str()).execute(conn).await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|e| RelationalError::backend(&self.logical_name, e.to_string()))
    }
}

#[async_trait]
impl AdapterLifecycle for DieselRelationalAdapter {
    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RelationalOrm
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ProbeError::backend(&self.logical_name, e.to_string()))?;
        diesel::sql_query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(|e| ProbeError::backend(&self.logical_name, e.to_string()))?;
        Ok(())
    }

    async fn close(&self, drain: Duration) -> DrainOutcome {
        super::super::wait_for_pool_drain(drain, || {
            let state = self.pool.state();
            state.connections == state.idle_connections
        })
        .await
    }
}
