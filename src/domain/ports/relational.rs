//! Port contract for relational persistence.
//!
//! All three relational backend kinds (ORM, raw SQL, YAML-declared schema)
//! satisfy this trait identically; callers issue reads, writes, and
//! transactions without knowing which variant backs them. Statements are
//! opaque SQL text — this crate deliberately defines no query language.

use std::fmt;

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by relational adapters.
    pub enum RelationalError {
        /// The pool ceiling was reached and no connection freed up within
        /// the connect timeout. Recoverable; callers may retry with backoff.
        PoolExhausted { logical_name: String } => "relational store '{logical_name}': connection pool exhausted",
        /// The backend rejected or failed the operation.
        Backend { logical_name: String, message: String } => "relational store '{logical_name}': {message}",
        /// A result row could not be mapped into a record.
        Decode { logical_name: String, message: String } => "relational store '{logical_name}': row decode failed: {message}",
    }
}

/// Validation failure raised when constructing [`SqlText`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("SQL statement must not be empty")]
pub struct EmptySqlText;

/// A validated, non-empty SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlText(String);

impl SqlText {
    /// Wrap a statement, rejecting empty or whitespace-only text.
    pub fn new(statement: impl Into<String>) -> Result<Self, EmptySqlText> {
        let statement = statement.into();
        if statement.trim().is_empty() {
            return Err(EmptySqlText);
        }
        Ok(Self(statement))
    }

    /// The raw statement text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One result row as an ordered column-name → JSON-value map.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Capability contract shared by every relational backend variant.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Execute a query and return its rows.
    async fn read(&self, query: &SqlText) -> Result<Vec<Record>, RelationalError>;

    /// Execute a statement and return the number of rows affected.
    async fn write(&self, statement: &SqlText) -> Result<u64, RelationalError>;

    /// Execute every statement on a single checked-out connection.
    ///
    /// Commits when all statements succeed; rolls back and surfaces the
    /// failure otherwise. The connection is returned to the pool on every
    /// exit path, including cancellation.
    async fn transaction(&self, statements: &[SqlText]) -> Result<(), RelationalError>;
}
