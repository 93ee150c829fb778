//! Port contract for document storage.

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by document store adapters.
    pub enum DocumentError {
        /// The backend rejected or failed the operation.
        Backend { logical_name: String, message: String } => "document store '{logical_name}': {message}",
        /// A filter or document could not be converted for the backend.
        Serialization { logical_name: String, message: String } => "document store '{logical_name}': serialization failed: {message}",
    }
}

/// Whether an upsert created a new document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Capability contract for document stores.
///
/// Operations act on a logical collection name and are atomic per
/// operation only; no cross-collection transaction guarantee exists.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find documents in `collection` matching `filter` (a JSON object).
    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, DocumentError>;

    /// Insert or replace the document in `collection` matching `filter`.
    async fn upsert(
        &self,
        collection: &str,
        filter: &Value,
        document: &Value,
    ) -> Result<UpsertOutcome, DocumentError>;
}
