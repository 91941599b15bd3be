//! Operation log backed by a durable data log.

use crate::config::DurableLogConfig;
use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::logs::data_log::{DurableDataLog, DurableDataLogFactory};
use crate::logs::operation::{Operation, OperationSerializer};
use crate::types::ContainerId;
use async_trait::async_trait;
use segstore_wire::VersionedSerializer;
use std::sync::Arc;

/// Ordered, durable record of a container's operations.
#[async_trait]
pub trait OperationLog: Send + Sync {
    /// The container this log belongs to.
    fn container_id(&self) -> ContainerId;

    /// Opens the underlying log and returns every recorded operation in order.
    async fn recover(&self) -> SegmentStoreResult<Vec<Operation>>;

    /// Durably records an operation and returns its sequence number.
    async fn add(&self, operation: &Operation) -> SegmentStoreResult<u64>;

    /// Closes the log.
    fn close(&self);
}

/// Produces one operation log per container.
pub trait OperationLogFactory: Send + Sync {
    /// Returns a new operation log for a container.
    fn create_operation_log(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn OperationLog>>;
}

/// [`OperationLog`] that encodes operations with [`OperationSerializer`]
/// and stores them in a [`DurableDataLog`].
pub struct DurableLog {
    container_id: ContainerId,
    data_log: Arc<dyn DurableDataLog>,
    config: DurableLogConfig,
}

impl DurableLog {
    /// Creates an operation log over a data log.
    pub fn new(
        container_id: ContainerId,
        data_log: Arc<dyn DurableDataLog>,
        config: DurableLogConfig,
    ) -> Self {
        Self {
            container_id,
            data_log,
            config,
        }
    }

    /// Tuning this log was created with.
    pub fn config(&self) -> &DurableLogConfig {
        &self.config
    }
}

#[async_trait]
impl OperationLog for DurableLog {
    fn container_id(&self) -> ContainerId {
        self.container_id
    }

    async fn recover(&self) -> SegmentStoreResult<Vec<Operation>> {
        self.data_log.initialize().await?;
        let entries = self.data_log.read_all().await?;

        let mut operations = Vec::with_capacity(entries.len());
        let mut last_sequence = 0u64;
        for entry in entries {
            if entry.sequence <= last_sequence {
                return Err(SegmentStoreError::DataLog(format!(
                    "container {}: sequence {} follows {}",
                    self.container_id, entry.sequence, last_sequence
                )));
            }
            last_sequence = entry.sequence;
            operations.push(OperationSerializer.deserialize(&entry.data)?);
        }

        tracing::debug!(
            container_id = self.container_id,
            operations = operations.len(),
            "recovered operation log"
        );
        Ok(operations)
    }

    async fn add(&self, operation: &Operation) -> SegmentStoreResult<u64> {
        let bytes = OperationSerializer.serialize(operation)?;
        self.data_log.append(bytes).await
    }

    fn close(&self) {
        self.data_log.close();
    }
}

/// Builds [`DurableLog`]s from a data log factory and log tuning.
///
/// The tuning is forwarded to every log as given.
pub struct DurableLogFactory {
    config: DurableLogConfig,
    data_log_factory: Arc<dyn DurableDataLogFactory>,
}

impl DurableLogFactory {
    /// Creates a factory.
    pub fn new(config: DurableLogConfig, data_log_factory: Arc<dyn DurableDataLogFactory>) -> Self {
        Self {
            config,
            data_log_factory,
        }
    }

    /// The log tuning passed to every log.
    pub fn config(&self) -> &DurableLogConfig {
        &self.config
    }

    /// The data log factory backing every log.
    pub fn data_log_factory(&self) -> &Arc<dyn DurableDataLogFactory> {
        &self.data_log_factory
    }
}

impl OperationLogFactory for DurableLogFactory {
    fn create_operation_log(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn OperationLog>> {
        let data_log = self.data_log_factory.create_data_log(container_id)?;
        Ok(Arc::new(DurableLog::new(
            container_id,
            data_log,
            self.config.clone(),
        )))
    }
}
