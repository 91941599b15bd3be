//! Builder fixtures.
//!
//! Builders created here run on the caller's tokio runtime, so tests do not
//! spin up a worker pool of their own.

use crate::recording::{
    CreationCounter, RecordingContainerManager, RecordingDataLogFactory, RecordingExecutor,
    RecordingRegistry, RecordingStorageFactory, ReleaseLog,
};
use crate::stub::StubRegistry;
use segstore_server::inmemory::InMemoryMetadataRepository;
use segstore_server::{
    DurableDataLogFactory, ExecutionContext, LocalSegmentContainerManager, MetadataRepository,
    RuntimeHandleExecutor, SegmentContainerManager, SegmentContainerRegistry, ServiceBuilder,
    ServiceBuilderConfig, ServiceComponents, StorageFactory, StreamSegmentContainerRegistry,
};
use std::sync::Arc;
use std::time::Duration;

/// Generous timeout for operations that are expected to succeed.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration with `container_count` containers.
pub fn test_config(container_count: u32) -> ServiceBuilderConfig {
    ServiceBuilderConfig::new()
        .with_container_count(container_count)
        .with_thread_pool_size(2)
}

/// Executor over the current tokio runtime.
///
/// # Panics
///
/// Panics outside a tokio runtime.
pub fn current_executor() -> Arc<dyn ExecutionContext> {
    Arc::new(RuntimeHandleExecutor::current().expect("tokio runtime"))
}

/// In-memory builder on the current runtime.
///
/// # Panics
///
/// Panics outside a tokio runtime.
pub fn in_memory_builder(container_count: u32) -> ServiceBuilder {
    ServiceBuilder::with_execution_context(
        test_config(container_count),
        ServiceComponents::in_memory(),
        current_executor(),
    )
    .expect("in-memory builder")
}

/// In-memory components whose releasable parts record into `log`.
///
/// The registry is the default one, wrapped to record its release.
pub fn recording_components(log: &ReleaseLog) -> ServiceComponents {
    let data_log_log = log.clone();
    let storage_log = log.clone();
    let registry_log = log.clone();
    let manager_log = log.clone();

    ServiceComponents::new()
        .with_data_log_factory(move |_| {
            let factory: Arc<dyn DurableDataLogFactory> =
                Arc::new(RecordingDataLogFactory::new(data_log_log.clone()));
            Ok(factory)
        })
        .with_storage_factory(move |_| {
            let factory: Arc<dyn StorageFactory> =
                Arc::new(RecordingStorageFactory::new(storage_log.clone()));
            Ok(factory)
        })
        .with_metadata_repository(|_| {
            let repository: Arc<dyn MetadataRepository> =
                Arc::new(InMemoryMetadataRepository::new());
            Ok(repository)
        })
        .with_container_registry(move |setup, container_factory| {
            let inner: Arc<dyn SegmentContainerRegistry> = Arc::new(
                StreamSegmentContainerRegistry::new(container_factory, Arc::clone(setup.executor)),
            );
            let registry: Arc<dyn SegmentContainerRegistry> =
                Arc::new(RecordingRegistry::new(inner, registry_log.clone()));
            Ok(registry)
        })
        .with_container_manager(move |setup, registry| {
            let inner: Arc<dyn SegmentContainerManager> = Arc::new(
                LocalSegmentContainerManager::new(registry, setup.config.service.container_count),
            );
            let manager: Arc<dyn SegmentContainerManager> =
                Arc::new(RecordingContainerManager::new(inner, manager_log.clone()));
            Ok(manager)
        })
}

/// Builder over [`recording_components`] with a [`RecordingExecutor`].
///
/// # Panics
///
/// Panics outside a tokio runtime.
pub fn recording_builder(container_count: u32, log: &ReleaseLog) -> ServiceBuilder {
    ServiceBuilder::with_execution_context(
        test_config(container_count),
        recording_components(log),
        Arc::new(RecordingExecutor::current(log.clone())),
    )
    .expect("recording builder")
}

/// Builder over [`recording_components`] whose registry is `registry`.
///
/// The container factory is still built, so every releasable component
/// exists once the registry is requested.
///
/// # Panics
///
/// Panics outside a tokio runtime.
pub fn stub_builder(
    container_count: u32,
    log: &ReleaseLog,
    registry: Arc<StubRegistry>,
) -> ServiceBuilder {
    let components = recording_components(log).with_container_registry(move |_, _| {
        let registry: Arc<dyn SegmentContainerRegistry> = registry.clone();
        Ok(registry)
    });

    ServiceBuilder::with_execution_context(
        test_config(container_count),
        components,
        Arc::new(RecordingExecutor::current(log.clone())),
    )
    .expect("stub builder")
}

/// In-memory components whose storage factory creator counts its calls.
///
/// The creator sleeps for `delay` so concurrent first requests overlap.
pub fn counted_components(counter: &CreationCounter, delay: Duration) -> ServiceComponents {
    let counter = counter.clone();
    ServiceComponents::in_memory().with_storage_factory(move |_| {
        counter.hit();
        std::thread::sleep(delay);
        let factory: Arc<dyn StorageFactory> =
            Arc::new(segstore_server::inmemory::InMemoryStorageFactory::new());
        Ok(factory)
    })
}
