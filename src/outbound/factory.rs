//! Live adapter construction, keyed on descriptor kind.
//!
//! This is the only place a configured kind selects a concrete backend;
//! everything above it works against ports.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    BackendFactory, BackendUnavailableError, ConstructedAdapter, PortHandle,
};

use super::cache::RedisCache;
use super::document::MongoDocumentStore;
use super::queue::RedisTaskQueue;
use super::relational::{
    DieselRelationalAdapter, SqlxRelationalAdapter, YamlSchemaRelationalAdapter,
};

/// Factory producing real, pooled adapters.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveBackendFactory;

#[async_trait]
impl BackendFactory for LiveBackendFactory {
    async fn build(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<ConstructedAdapter, BackendUnavailableError> {
        let adapter = match descriptor.kind() {
            BackendKind::RelationalOrm => {
                let adapter = Arc::new(DieselRelationalAdapter::connect(descriptor).await?);
                ConstructedAdapter {
                    port: PortHandle::Relational(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::RelationalRaw => {
                let adapter = Arc::new(SqlxRelationalAdapter::connect(descriptor).await?);
                ConstructedAdapter {
                    port: PortHandle::Relational(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::RelationalYamlSchema => {
                let adapter = Arc::new(YamlSchemaRelationalAdapter::connect(descriptor).await?);
                ConstructedAdapter {
                    port: PortHandle::Relational(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::Document => {
                let adapter = Arc::new(MongoDocumentStore::connect(descriptor).await?);
                ConstructedAdapter {
                    port: PortHandle::Document(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::Cache => {
                let adapter = Arc::new(RedisCache::connect(descriptor).await?);
                ConstructedAdapter {
                    port: PortHandle::Cache(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::Queue => {
                let adapter = Arc::new(RedisTaskQueue::connect(descriptor).await?);
                ConstructedAdapter {
                    port: PortHandle::Queue(adapter.clone()),
                    lifecycle: adapter,
                }
            }
        };
        Ok(adapter)
    }
}
