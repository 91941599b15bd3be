//! Container factory.

use crate::containers::{SegmentContainer, StreamSegmentContainer};
use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::executor::ExecutionContext;
use crate::logs::OperationLogFactory;
use crate::metadata::MetadataRepository;
use crate::reading::ReadIndexFactory;
use crate::storage::StorageFactory;
use crate::types::ContainerId;
use std::sync::Arc;

/// Creates containers by id. Created containers are not started.
pub trait SegmentContainerFactory: Send + Sync {
    /// Returns a fresh container for `container_id`.
    fn create_container(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn SegmentContainer>>;
}

/// Builds [`StreamSegmentContainer`]s from the shared subsystem factories.
///
/// Every container it creates receives the same metadata repository,
/// operation log factory, read index factory and storage factory, and runs
/// its storage flushes on the shared execution context.
pub struct StreamSegmentContainerFactory {
    metadata_repository: Arc<dyn MetadataRepository>,
    operation_log_factory: Arc<dyn OperationLogFactory>,
    read_index_factory: Arc<dyn ReadIndexFactory>,
    storage_factory: Arc<dyn StorageFactory>,
    executor: Arc<dyn ExecutionContext>,
    container_count: u32,
}

impl StreamSegmentContainerFactory {
    /// Creates the factory.
    pub fn new(
        metadata_repository: Arc<dyn MetadataRepository>,
        operation_log_factory: Arc<dyn OperationLogFactory>,
        read_index_factory: Arc<dyn ReadIndexFactory>,
        storage_factory: Arc<dyn StorageFactory>,
        executor: Arc<dyn ExecutionContext>,
        container_count: u32,
    ) -> Self {
        Self {
            metadata_repository,
            operation_log_factory,
            read_index_factory,
            storage_factory,
            executor,
            container_count,
        }
    }

    /// Shared metadata repository.
    pub fn metadata_repository(&self) -> &Arc<dyn MetadataRepository> {
        &self.metadata_repository
    }

    /// Shared operation log factory.
    pub fn operation_log_factory(&self) -> &Arc<dyn OperationLogFactory> {
        &self.operation_log_factory
    }

    /// Shared read index factory.
    pub fn read_index_factory(&self) -> &Arc<dyn ReadIndexFactory> {
        &self.read_index_factory
    }

    /// Shared storage factory.
    pub fn storage_factory(&self) -> &Arc<dyn StorageFactory> {
        &self.storage_factory
    }

    /// Shared execution context.
    pub fn execution_context(&self) -> &Arc<dyn ExecutionContext> {
        &self.executor
    }

    /// Number of container ids this factory accepts.
    pub fn container_count(&self) -> u32 {
        self.container_count
    }
}

impl SegmentContainerFactory for StreamSegmentContainerFactory {
    fn create_container(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn SegmentContainer>> {
        if container_id >= self.container_count {
            return Err(SegmentStoreError::invalid_config(format!(
                "container id {container_id} out of range 0..{}",
                self.container_count
            )));
        }

        let metadata = self.metadata_repository.metadata(container_id);
        let read_index = self.read_index_factory.create_read_index(container_id);
        let storage = self.storage_factory.create_storage(container_id)?;
        let operation_log = self
            .operation_log_factory
            .create_operation_log(container_id)?;

        tracing::debug!(container_id, "created container");
        Ok(Arc::new(StreamSegmentContainer::new(
            container_id,
            metadata,
            operation_log,
            read_index,
            storage,
            Arc::clone(&self.executor),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DurableLogConfig;
    use crate::containers::ContainerState;
    use crate::executor::RuntimeHandleExecutor;
    use crate::inmemory::{
        InMemoryDurableDataLogFactory, InMemoryMetadataRepository, InMemoryStorageFactory,
    };
    use crate::logs::DurableLogFactory;
    use crate::reading::ContainerReadIndexFactory;

    fn factory(count: u32) -> StreamSegmentContainerFactory {
        StreamSegmentContainerFactory::new(
            Arc::new(InMemoryMetadataRepository::new()),
            Arc::new(DurableLogFactory::new(
                DurableLogConfig::default(),
                Arc::new(InMemoryDurableDataLogFactory::new()),
            )),
            Arc::new(ContainerReadIndexFactory::new()),
            Arc::new(InMemoryStorageFactory::new()),
            Arc::new(RuntimeHandleExecutor::current().unwrap()),
            count,
        )
    }

    #[tokio::test]
    async fn creates_unstarted_containers() {
        let factory = factory(2);
        let container = factory.create_container(1).unwrap();
        assert_eq!(container.id(), 1);
        assert_eq!(container.state(), ContainerState::Created);
    }

    #[tokio::test]
    async fn rejects_out_of_range_ids() {
        let factory = factory(2);
        assert!(matches!(
            factory.create_container(2),
            Err(SegmentStoreError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn recreated_container_recovers_segments() {
        let factory = factory(1);
        let first = factory.create_container(0).unwrap();
        first.start().await.unwrap();
        first.create_segment("s").await.unwrap();
        first.stop().await.unwrap();

        let second = factory.create_container(0).unwrap();
        second.start().await.unwrap();
        assert_eq!(second.get_segment_info("s").await.unwrap().length, 0);
    }
}
