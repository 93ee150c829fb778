//! Document adapter over the official MongoDB driver.
//!
//! Filters and documents cross the port as JSON values and are converted
//! to BSON at this boundary; conversion failures surface as serialization
//! errors rather than backend errors.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde_json::Value;
use tracing::debug;

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    AdapterLifecycle, BackendUnavailableError, DocumentError, DocumentStore, DrainOutcome,
    ProbeError, UpsertOutcome,
};

/// Document adapter bound to one MongoDB client and database.
pub struct MongoDocumentStore {
    logical_name: String,
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    /// Build the client described by `descriptor`.
    pub async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        let uri = descriptor
            .require_param("uri")
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
        let database_name = descriptor
            .require_param("database")
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
        options.max_pool_size = Some(descriptor.pool_max());
        options.min_pool_size = Some(descriptor.pool_min());
        options.connect_timeout = Some(descriptor.connect_timeout());
        options.server_selection_timeout = Some(descriptor.connect_timeout());

        debug!(
            logical_name = descriptor.logical_name(),
            database = database_name,
            "building mongodb client"
        );
        let client = Client::with_options(options)
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
        let database = client.database(database_name);

        Ok(Self {
            logical_name: descriptor.logical_name().to_string(),
            client,
            database,
        })
    }

    fn to_bson_document(&self, label: &str, value: &Value) -> Result<Document, DocumentError> {
        bson::to_document(value).map_err(|e| {
            DocumentError::serialization(&self.logical_name, format!("{label}: {e}"))
        })
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, DocumentError> {
        let filter = self.to_bson_document("filter", filter)?;
        let cursor = self
            .database
            .collection::<Document>(collection)
            .find(filter)
            .await
            .map_err(|e| DocumentError::backend(&self.logical_name, e.to_string()))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| DocumentError::backend(&self.logical_name, e.to_string()))?;
        documents
            .into_iter()
            .map(|document| {
                bson::from_document(document).map_err(|e| {
                    DocumentError::serialization(&self.logical_name, e.to_string())
                })
            })
            .collect()
    }

    async fn upsert(
        &self,
        collection: &str,
        filter: &Value,
        document: &Value,
    ) -> Result<UpsertOutcome, DocumentError> {
        let filter = self.to_bson_document("filter", filter)?;
        let replacement = self.to_bson_document("document", document)?;

        let result = self
            .database
            .collection::<Document>(collection)
            .replace_one(filter, replacement)
            .upsert(true)
            .await
            .map_err(|e| DocumentError::backend(&self.logical_name, e.to_string()))?;

        if result.upserted_id.is_some() {
            Ok(UpsertOutcome::Created)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }
}

#[async_trait]
impl AdapterLifecycle for MongoDocumentStore {
    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::backend(&self.logical_name, e.to_string()))
    }

    async fn close(&self, drain: Duration) -> DrainOutcome {
        // Shutdown waits for in-flight operations; the clone shuts down the
        // shared client, not a copy.
        match tokio::time::timeout(drain, self.client.clone().shutdown()).await {
            Ok(()) => DrainOutcome::Clean,
            Err(_) => DrainOutcome::Forced,
        }
    }
}
