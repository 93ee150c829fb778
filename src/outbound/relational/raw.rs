//! Raw-SQL relational adapter over `sqlx`.
//!
//! Statements are executed exactly as written; result rows are decoded
//! column-by-column into JSON records. The executor is shared with the
//! YAML-schema adapter, which differs only in how it obtains its schema.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::debug;

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    AdapterLifecycle, BackendUnavailableError, DrainOutcome, ProbeError, Record, RelationalError,
    RelationalStore, SqlText,
};

use super::{postgres_url, redact_url};

/// Pooled sqlx executor shared by the raw and YAML-schema adapters.
pub(crate) struct SqlxExecutor {
    logical_name: String,
    pool: PgPool,
}

impl SqlxExecutor {
    pub(crate) async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        let url = postgres_url(descriptor)?;
        debug!(
            logical_name = descriptor.logical_name(),
            url = %redact_url(&url),
            "building sqlx pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(descriptor.pool_max())
            .min_connections(descriptor.pool_min())
            .acquire_timeout(descriptor.connect_timeout())
            .connect(&url)
            .await
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;

        Ok(Self {
            logical_name: descriptor.logical_name().to_string(),
            pool,
        })
    }

    fn operation_error(&self, error: sqlx::Error) -> RelationalError {
        match error {
            sqlx::Error::PoolTimedOut => RelationalError::pool_exhausted(&self.logical_name),
            other => RelationalError::backend(&self.logical_name, other.to_string()),
        }
    }

    pub(crate) async fn read(&self, query: &SqlText) -> Result<Vec<Record>, RelationalError> {
        let rows = sqlx::query(query.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.operation_error(e))?;
        rows.iter()
            .map(|row| row_to_record(&self.logical_name, row))
            .collect()
    }

    pub(crate) async fn write(&self, statement: &SqlText) -> Result<u64, RelationalError> {
        let result = sqlx::query(statement.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| self.operation_error(e))?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn transaction(
        &self,
        statements: &[SqlText],
    ) -> Result<(), RelationalError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| self.operation_error(e))?;
        for statement in statements {
            if let Err(e) = sqlx::query(statement.as_str()).execute(&mut *tx).await {
                // Explicit rollback so the failure is not masked by a
                // secondary error during implicit drop.
                let _ = tx.rollback().await;
                return Err(self.operation_error(e));
            }
        }
        tx.commit().await.map_err(|e| self.operation_error(e))
    }

    pub(crate) async fn probe(&self) -> Result<(), ProbeError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::backend(&self.logical_name, e.to_string()))
    }

    pub(crate) async fn close(&self, drain: Duration) -> DrainOutcome {
        match tokio::time::timeout(drain, self.pool.close()).await {
            Ok(()) => DrainOutcome::Clean,
            Err(_) => DrainOutcome::Forced,
        }
    }

    pub(crate) fn logical_name(&self) -> &str {
        &self.logical_name
    }
}

fn row_to_record(logical_name: &str, row: &PgRow) -> Result<Record, RelationalError> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_column(logical_name, row, column.ordinal(), column.type_info().name())?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn decode_column(
    logical_name: &str,
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> Result<serde_json::Value, RelationalError> {
    use serde_json::Value;

    let decode_err =
        |e: sqlx::Error| RelationalError::decode(logical_name, e.to_string());

    let value = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(decode_err)?
            .map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(decode_err)?
            .map(Value::from),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map_err(decode_err)?
            .map(Value::from),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(decode_err)?
            .map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(decode_err)?
            .map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(index)
            .map_err(decode_err)?
            .map(Value::String),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)
            .map_err(decode_err)?,
        // String-rendered, matching how row_to_json serializes them.
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::String(v.to_rfc3339())),
        other => {
            return Err(RelationalError::decode(
                logical_name,
                format!("unsupported column type '{other}'"),
            ));
        }
    };

    Ok(value.unwrap_or(serde_json::Value::Null))
}

/// Relational adapter in raw-SQL mode, bound to one sqlx pool.
pub struct SqlxRelationalAdapter {
    executor: SqlxExecutor,
}

impl SqlxRelationalAdapter {
    /// Build the pool described by `descriptor`.
    pub async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        Ok(Self {
            executor: SqlxExecutor::connect(descriptor).await?,
        })
    }
}

#[async_trait]
impl RelationalStore for SqlxRelationalAdapter {
    async fn read(&self, query: &SqlText) -> Result<Vec<Record>, RelationalError> {
        self.executor.read(query).await
    }

    async fn write(&self, statement: &SqlText) -> Result<u64, RelationalError> {
        self.executor.write(statement).await
    }

    async fn transaction(&self, statements: &[SqlText]) -> Result<(), RelationalError> {
        self.executor.transaction(statements).await
    }
}

#[async_trait]
impl AdapterLifecycle for SqlxRelationalAdapter {
    fn logical_name(&self) -> &str {
        self.executor.logical_name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RelationalRaw
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        self.executor.probe().await
    }

    async fn close(&self, drain: Duration) -> DrainOutcome {
        self.executor.close(drain).await
    }
}
