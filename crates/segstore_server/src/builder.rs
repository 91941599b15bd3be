//! Service assembly.
//!
//! [`ServiceBuilder`] wires the pluggable subsystems into a running segment
//! store. Each component is created lazily on first request, at most once,
//! and cached; later requests return the same instance. Creation follows
//! dependency order:
//!
//! ```text
//! metadata repository ─┐
//! read index factory ──┤
//! storage factory ─────┼──► container factory ──► registry ──► manager
//! data log factory ──► operation log factory ─┘                   │
//!                                                               service
//! ```
//!
//! [`ServiceBuilder::close`] releases what was built in reverse order and
//! shuts the execution context down last.
//!
//! # Example
//!
//! ```rust
//! use segstore_server::{ServiceBuilder, ServiceBuilderConfig, StreamSegmentStore};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = ServiceBuilder::in_memory(ServiceBuilderConfig::new().with_container_count(2))?;
//! builder.initialize(Duration::from_secs(5)).await?;
//!
//! let store = builder.create_segment_service()?;
//! let timeout = Duration::from_secs(1);
//! store.create_segment("scope/stream/0", timeout).await?;
//! store.append("scope/stream/0", b"hello".to_vec(), timeout).await?;
//!
//! builder.close().await;
//! # Ok(())
//! # }
//! ```

use crate::config::ServiceBuilderConfig;
use crate::containers::{SegmentContainerFactory, StreamSegmentContainerFactory};
use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::executor::{ExecutionContext, WorkerPool};
use crate::inmemory::{
    InMemoryDurableDataLogFactory, InMemoryMetadataRepository, InMemoryStorageFactory,
};
use crate::logs::{DurableDataLogFactory, DurableLogFactory, OperationLogFactory};
use crate::manager::{LocalSegmentContainerManager, SegmentContainerManager};
use crate::mapper::SegmentToContainerMapper;
use crate::metadata::MetadataRepository;
use crate::reading::{ContainerReadIndexFactory, ReadIndexFactory};
use crate::registry::{SegmentContainerRegistry, StreamSegmentContainerRegistry};
use crate::service::{StreamSegmentService, StreamSegmentStore};
use crate::storage::StorageFactory;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What every component creator receives.
#[derive(Clone, Copy)]
pub struct ComponentSetup<'a> {
    /// The builder configuration.
    pub config: &'a ServiceBuilderConfig,
    /// The shared execution context.
    pub executor: &'a Arc<dyn ExecutionContext>,
}

/// Creates the durable data log factory.
pub type DataLogFactoryCreator = Box<
    dyn Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn DurableDataLogFactory>>
        + Send
        + Sync,
>;

/// Creates the storage factory.
pub type StorageFactoryCreator =
    Box<dyn Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn StorageFactory>> + Send + Sync>;

/// Creates the metadata repository.
pub type MetadataRepositoryCreator = Box<
    dyn Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn MetadataRepository>> + Send + Sync,
>;

/// Creates the read index factory.
pub type ReadIndexFactoryCreator = Box<
    dyn Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn ReadIndexFactory>> + Send + Sync,
>;

/// Creates the container registry from the container factory.
pub type RegistryCreator = Box<
    dyn Fn(
            &ComponentSetup<'_>,
            Arc<dyn SegmentContainerFactory>,
        ) -> SegmentStoreResult<Arc<dyn SegmentContainerRegistry>>
        + Send
        + Sync,
>;

/// Creates the container manager from the registry.
pub type ManagerCreator = Box<
    dyn Fn(
            &ComponentSetup<'_>,
            Arc<dyn SegmentContainerRegistry>,
        ) -> SegmentStoreResult<Arc<dyn SegmentContainerManager>>
        + Send
        + Sync,
>;

/// The injected creators the builder assembles the service from.
///
/// The data log factory, storage factory, metadata repository and container
/// manager are required. The read index factory and container registry
/// fall back to [`ContainerReadIndexFactory`] and
/// [`StreamSegmentContainerRegistry`].
#[derive(Default)]
pub struct ServiceComponents {
    data_log_factory: Option<DataLogFactoryCreator>,
    storage_factory: Option<StorageFactoryCreator>,
    metadata_repository: Option<MetadataRepositoryCreator>,
    read_index_factory: Option<ReadIndexFactoryCreator>,
    container_registry: Option<RegistryCreator>,
    container_manager: Option<ManagerCreator>,
}

impl ServiceComponents {
    /// Creates an empty set of components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory subsystems and the single-process container manager.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new()
            .with_data_log_factory(|_| {
                let factory: Arc<dyn DurableDataLogFactory> =
                    Arc::new(InMemoryDurableDataLogFactory::new());
                Ok(factory)
            })
            .with_storage_factory(|_| {
                let factory: Arc<dyn StorageFactory> = Arc::new(InMemoryStorageFactory::new());
                Ok(factory)
            })
            .with_metadata_repository(|_| {
                let repository: Arc<dyn MetadataRepository> =
                    Arc::new(InMemoryMetadataRepository::new());
                Ok(repository)
            })
            .with_local_container_manager()
    }

    /// Sets the durable data log factory creator.
    #[must_use]
    pub fn with_data_log_factory<F>(mut self, create: F) -> Self
    where
        F: Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn DurableDataLogFactory>>
            + Send
            + Sync
            + 'static,
    {
        self.data_log_factory = Some(Box::new(create));
        self
    }

    /// Sets the storage factory creator.
    #[must_use]
    pub fn with_storage_factory<F>(mut self, create: F) -> Self
    where
        F: Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn StorageFactory>>
            + Send
            + Sync
            + 'static,
    {
        self.storage_factory = Some(Box::new(create));
        self
    }

    /// Sets the metadata repository creator.
    #[must_use]
    pub fn with_metadata_repository<F>(mut self, create: F) -> Self
    where
        F: Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn MetadataRepository>>
            + Send
            + Sync
            + 'static,
    {
        self.metadata_repository = Some(Box::new(create));
        self
    }

    /// Overrides the read index factory.
    #[must_use]
    pub fn with_read_index_factory<F>(mut self, create: F) -> Self
    where
        F: Fn(&ComponentSetup<'_>) -> SegmentStoreResult<Arc<dyn ReadIndexFactory>>
            + Send
            + Sync
            + 'static,
    {
        self.read_index_factory = Some(Box::new(create));
        self
    }

    /// Overrides the container registry.
    #[must_use]
    pub fn with_container_registry<F>(mut self, create: F) -> Self
    where
        F: Fn(
                &ComponentSetup<'_>,
                Arc<dyn SegmentContainerFactory>,
            ) -> SegmentStoreResult<Arc<dyn SegmentContainerRegistry>>
            + Send
            + Sync
            + 'static,
    {
        self.container_registry = Some(Box::new(create));
        self
    }

    /// Sets the container manager creator.
    #[must_use]
    pub fn with_container_manager<F>(mut self, create: F) -> Self
    where
        F: Fn(
                &ComponentSetup<'_>,
                Arc<dyn SegmentContainerRegistry>,
            ) -> SegmentStoreResult<Arc<dyn SegmentContainerManager>>
            + Send
            + Sync
            + 'static,
    {
        self.container_manager = Some(Box::new(create));
        self
    }

    /// Uses [`LocalSegmentContainerManager`], which owns every container.
    #[must_use]
    pub fn with_local_container_manager(self) -> Self {
        self.with_container_manager(|setup, registry| {
            let manager: Arc<dyn SegmentContainerManager> = Arc::new(
                LocalSegmentContainerManager::new(registry, setup.config.service.container_count),
            );
            Ok(manager)
        })
    }

    fn validate(&self) -> SegmentStoreResult<()> {
        let required = [
            ("data_log_factory", self.data_log_factory.is_some()),
            ("storage_factory", self.storage_factory.is_some()),
            ("metadata_repository", self.metadata_repository.is_some()),
            ("container_manager", self.container_manager.is_some()),
        ];
        match required.iter().find(|(_, present)| !present) {
            Some((component, _)) => Err(SegmentStoreError::MissingComponent {
                component: *component,
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ServiceComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceComponents")
            .field("data_log_factory", &self.data_log_factory.is_some())
            .field("storage_factory", &self.storage_factory.is_some())
            .field("metadata_repository", &self.metadata_repository.is_some())
            .field("read_index_factory", &self.read_index_factory.is_some())
            .field("container_registry", &self.container_registry.is_some())
            .field("container_manager", &self.container_manager.is_some())
            .finish()
    }
}

/// A lazily created, cached component.
///
/// The lock is held while the value is created, so concurrent first
/// requests run the creator once. Failures are not cached.
struct Singleton<T: ?Sized> {
    name: &'static str,
    value: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized> Singleton<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Mutex::new(None),
        }
    }

    fn get_or_try_init<F>(&self, closed: &AtomicBool, create: F) -> SegmentStoreResult<Arc<T>>
    where
        F: FnOnce() -> SegmentStoreResult<Arc<T>>,
    {
        let mut value = self.value.lock();
        if closed.load(Ordering::SeqCst) {
            return Err(SegmentStoreError::BuilderClosed);
        }
        if let Some(existing) = value.as_ref() {
            return Ok(Arc::clone(existing));
        }

        match create() {
            Ok(created) => {
                tracing::debug!(component = self.name, "component created");
                *value = Some(Arc::clone(&created));
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(component = self.name, error = %e, "component creation failed");
                Err(e)
            }
        }
    }

    fn take(&self) -> Option<Arc<T>> {
        self.value.lock().take()
    }

    fn is_initialized(&self) -> bool {
        self.value.lock().is_some()
    }
}

fn creation_error(component: &'static str, error: SegmentStoreError) -> SegmentStoreError {
    match error {
        SegmentStoreError::ComponentCreation { .. } | SegmentStoreError::BuilderClosed => error,
        other => SegmentStoreError::ComponentCreation {
            component,
            message: other.to_string(),
        },
    }
}

/// Assembles and owns the segment store service.
pub struct ServiceBuilder {
    config: ServiceBuilderConfig,
    components: ServiceComponents,
    mapper: SegmentToContainerMapper,
    executor: Arc<dyn ExecutionContext>,
    closed: AtomicBool,

    metadata_repository: Singleton<dyn MetadataRepository>,
    read_index_factory: Singleton<dyn ReadIndexFactory>,
    storage_factory: Singleton<dyn StorageFactory>,
    data_log_factory: Singleton<dyn DurableDataLogFactory>,
    operation_log_factory: Singleton<dyn OperationLogFactory>,
    container_factory: Singleton<dyn SegmentContainerFactory>,
    container_registry: Singleton<dyn SegmentContainerRegistry>,
    container_manager: Singleton<dyn SegmentContainerManager>,
}

impl ServiceBuilder {
    /// Creates a builder with its own [`WorkerPool`].
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, a required component is
    /// missing, or the worker pool cannot start.
    pub fn new(config: ServiceBuilderConfig, components: ServiceComponents) -> SegmentStoreResult<Self> {
        config.validate()?;
        components.validate()?;
        let pool = WorkerPool::new(config.service.thread_pool_size)?;
        Self::assemble(config, components, Arc::new(pool))
    }

    /// Creates a builder that runs on the given execution context. The
    /// builder shuts it down on [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a required component is
    /// missing.
    pub fn with_execution_context(
        config: ServiceBuilderConfig,
        components: ServiceComponents,
        executor: Arc<dyn ExecutionContext>,
    ) -> SegmentStoreResult<Self> {
        config.validate()?;
        components.validate()?;
        Self::assemble(config, components, executor)
    }

    /// Creates a builder over the in-memory subsystems.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn in_memory(config: ServiceBuilderConfig) -> SegmentStoreResult<Self> {
        Self::new(config, ServiceComponents::in_memory())
    }

    fn assemble(
        config: ServiceBuilderConfig,
        components: ServiceComponents,
        executor: Arc<dyn ExecutionContext>,
    ) -> SegmentStoreResult<Self> {
        let mapper = SegmentToContainerMapper::new(config.service.container_count)?;
        tracing::info!(
            containers = config.service.container_count,
            threads = config.service.thread_pool_size,
            "service builder created"
        );

        Ok(Self {
            config,
            components,
            mapper,
            executor,
            closed: AtomicBool::new(false),
            metadata_repository: Singleton::new("metadata_repository"),
            read_index_factory: Singleton::new("read_index_factory"),
            storage_factory: Singleton::new("storage_factory"),
            data_log_factory: Singleton::new("data_log_factory"),
            operation_log_factory: Singleton::new("operation_log_factory"),
            container_factory: Singleton::new("container_factory"),
            container_registry: Singleton::new("container_registry"),
            container_manager: Singleton::new("container_manager"),
        })
    }

    fn setup(&self) -> ComponentSetup<'_> {
        ComponentSetup {
            config: &self.config,
            executor: &self.executor,
        }
    }

    fn ensure_open(&self) -> SegmentStoreResult<()> {
        if self.is_closed() {
            Err(SegmentStoreError::BuilderClosed)
        } else {
            Ok(())
        }
    }

    /// The configuration the builder was created with.
    pub fn config(&self) -> &ServiceBuilderConfig {
        &self.config
    }

    /// The segment to container mapper.
    pub fn mapper(&self) -> &SegmentToContainerMapper {
        &self.mapper
    }

    /// The shared execution context.
    pub fn execution_context(&self) -> &Arc<dyn ExecutionContext> {
        &self.executor
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The metadata repository.
    ///
    /// # Errors
    ///
    /// Fails if the creator fails or the builder is closed.
    pub fn metadata_repository(&self) -> SegmentStoreResult<Arc<dyn MetadataRepository>> {
        self.metadata_repository.get_or_try_init(&self.closed, || {
            let create = self
                .components
                .metadata_repository
                .as_ref()
                .ok_or(SegmentStoreError::MissingComponent {
                    component: "metadata_repository",
                })?;
            create(&self.setup()).map_err(|e| creation_error("metadata_repository", e))
        })
    }

    /// The read index factory.
    ///
    /// # Errors
    ///
    /// Fails if the creator fails or the builder is closed.
    pub fn read_index_factory(&self) -> SegmentStoreResult<Arc<dyn ReadIndexFactory>> {
        self.read_index_factory.get_or_try_init(&self.closed, || {
            match self.components.read_index_factory.as_ref() {
                Some(create) => {
                    create(&self.setup()).map_err(|e| creation_error("read_index_factory", e))
                }
                None => {
                    let factory: Arc<dyn ReadIndexFactory> = Arc::new(ContainerReadIndexFactory::new());
                    Ok(factory)
                }
            }
        })
    }

    /// The storage factory.
    ///
    /// # Errors
    ///
    /// Fails if the creator fails or the builder is closed.
    pub fn storage_factory(&self) -> SegmentStoreResult<Arc<dyn StorageFactory>> {
        self.storage_factory.get_or_try_init(&self.closed, || {
            let create = self.components.storage_factory.as_ref().ok_or(
                SegmentStoreError::MissingComponent {
                    component: "storage_factory",
                },
            )?;
            create(&self.setup()).map_err(|e| creation_error("storage_factory", e))
        })
    }

    /// The durable data log factory.
    ///
    /// # Errors
    ///
    /// Fails if the creator fails or the builder is closed.
    pub fn data_log_factory(&self) -> SegmentStoreResult<Arc<dyn DurableDataLogFactory>> {
        self.data_log_factory.get_or_try_init(&self.closed, || {
            let create = self.components.data_log_factory.as_ref().ok_or(
                SegmentStoreError::MissingComponent {
                    component: "data_log_factory",
                },
            )?;
            create(&self.setup()).map_err(|e| creation_error("data_log_factory", e))
        })
    }

    /// The operation log factory, built over the data log factory with the
    /// configured log tuning.
    ///
    /// # Errors
    ///
    /// Fails if the data log factory cannot be created or the builder is
    /// closed.
    pub fn operation_log_factory(&self) -> SegmentStoreResult<Arc<dyn OperationLogFactory>> {
        self.operation_log_factory.get_or_try_init(&self.closed, || {
            let factory: Arc<dyn OperationLogFactory> = Arc::new(DurableLogFactory::new(
                self.config.durable_log.clone(),
                self.data_log_factory()?,
            ));
            Ok(factory)
        })
    }

    /// The container factory.
    ///
    /// # Errors
    ///
    /// Fails if one of its dependencies cannot be created or the builder is
    /// closed.
    pub fn container_factory(&self) -> SegmentStoreResult<Arc<dyn SegmentContainerFactory>> {
        self.container_factory.get_or_try_init(&self.closed, || {
            let metadata_repository = self.metadata_repository()?;
            let read_index_factory = self.read_index_factory()?;
            let storage_factory = self.storage_factory()?;
            let operation_log_factory = self.operation_log_factory()?;

            let factory: Arc<dyn SegmentContainerFactory> =
                Arc::new(StreamSegmentContainerFactory::new(
                    metadata_repository,
                    operation_log_factory,
                    read_index_factory,
                    storage_factory,
                    Arc::clone(&self.executor),
                    self.config.service.container_count,
                ));
            Ok(factory)
        })
    }

    /// The container registry.
    ///
    /// # Errors
    ///
    /// Fails if the creator or the container factory fails, or the builder
    /// is closed.
    pub fn container_registry(&self) -> SegmentStoreResult<Arc<dyn SegmentContainerRegistry>> {
        self.container_registry.get_or_try_init(&self.closed, || {
            let container_factory = self.container_factory()?;
            match self.components.container_registry.as_ref() {
                Some(create) => create(&self.setup(), container_factory)
                    .map_err(|e| creation_error("container_registry", e)),
                None => {
                    let registry: Arc<dyn SegmentContainerRegistry> =
                        Arc::new(StreamSegmentContainerRegistry::new(
                            container_factory,
                            Arc::clone(&self.executor),
                        ));
                    Ok(registry)
                }
            }
        })
    }

    /// The container manager.
    ///
    /// # Errors
    ///
    /// Fails if the creator or the registry fails, or the builder is closed.
    pub fn container_manager(&self) -> SegmentStoreResult<Arc<dyn SegmentContainerManager>> {
        self.container_manager.get_or_try_init(&self.closed, || {
            let registry = self.container_registry()?;
            let create = self.components.container_manager.as_ref().ok_or(
                SegmentStoreError::MissingComponent {
                    component: "container_manager",
                },
            )?;
            create(&self.setup(), registry).map_err(|e| creation_error("container_manager", e))
        })
    }

    /// Creates a new segment service over the shared registry.
    ///
    /// # Errors
    ///
    /// Fails if the registry cannot be created or the builder is closed.
    pub fn create_segment_service(&self) -> SegmentStoreResult<Arc<dyn StreamSegmentStore>> {
        self.ensure_open()?;
        let service: Arc<dyn StreamSegmentStore> = Arc::new(StreamSegmentService::new(
            self.container_registry()?,
            self.mapper,
        ));
        Ok(service)
    }

    /// Builds the container manager and lets it start its containers.
    ///
    /// # Errors
    ///
    /// Fails if the manager cannot be created or its containers do not start
    /// within `timeout`.
    pub async fn initialize(&self, timeout: Duration) -> SegmentStoreResult<()> {
        let manager = self.container_manager()?;
        manager.initialize(timeout).await
    }

    /// Releases every component that was built, in reverse dependency
    /// order, then shuts the execution context down.
    ///
    /// Idempotent; only the first call releases anything. Release failures
    /// are logged and do not stop the remaining releases.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("closing service builder");

        if let Some(manager) = self.container_manager.take() {
            if let Err(e) = manager.close().await {
                tracing::warn!(error = %e, "failed to close container manager");
            }
        }
        if let Some(registry) = self.container_registry.take() {
            if let Err(e) = registry.close().await {
                tracing::warn!(error = %e, "failed to close container registry");
            }
        }
        if let Some(factory) = self.data_log_factory.take() {
            if let Err(e) = factory.close() {
                tracing::warn!(error = %e, "failed to close data log factory");
            }
        }
        if let Some(factory) = self.storage_factory.take() {
            if let Err(e) = factory.close() {
                tracing::warn!(error = %e, "failed to close storage factory");
            }
        }

        // Nothing to release for these.
        self.container_factory.take();
        self.operation_log_factory.take();
        self.read_index_factory.take();
        self.metadata_repository.take();

        self.executor.shutdown();
        tracing::info!("service builder closed");
    }

    /// Names of the components built so far, in creation order.
    pub fn initialized_components(&self) -> Vec<&'static str> {
        [
            (self.metadata_repository.name, self.metadata_repository.is_initialized()),
            (self.read_index_factory.name, self.read_index_factory.is_initialized()),
            (self.storage_factory.name, self.storage_factory.is_initialized()),
            (self.data_log_factory.name, self.data_log_factory.is_initialized()),
            (self.operation_log_factory.name, self.operation_log_factory.is_initialized()),
            (self.container_factory.name, self.container_factory.is_initialized()),
            (self.container_registry.name, self.container_registry.is_initialized()),
            (self.container_manager.name, self.container_manager.is_initialized()),
        ]
        .into_iter()
        .filter_map(|(name, built)| built.then_some(name))
        .collect()
    }
}

impl std::fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("config", &self.config)
            .field("components", &self.components)
            .field("closed", &self.is_closed())
            .field("initialized", &self.initialized_components())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RuntimeHandleExecutor;

    fn handle_executor() -> Arc<dyn ExecutionContext> {
        Arc::new(RuntimeHandleExecutor::current().unwrap())
    }

    #[test]
    fn missing_components_fail_fast() {
        let err = ServiceBuilder::new(ServiceBuilderConfig::default(), ServiceComponents::new())
            .unwrap_err();
        assert_eq!(
            err,
            SegmentStoreError::MissingComponent {
                component: "data_log_factory"
            }
        );
    }

    #[test]
    fn missing_manager_reported_by_name() {
        let components = ServiceComponents::in_memory();
        let components = ServiceComponents {
            container_manager: None,
            ..components
        };
        let err = ServiceBuilder::new(ServiceBuilderConfig::default(), components).unwrap_err();
        assert_eq!(
            err,
            SegmentStoreError::MissingComponent {
                component: "container_manager"
            }
        );
    }

    #[test]
    fn zero_containers_rejected() {
        let config = ServiceBuilderConfig::new().with_container_count(0);
        assert!(matches!(
            ServiceBuilder::in_memory(config),
            Err(SegmentStoreError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn accessors_are_memoized() {
        let builder = ServiceBuilder::with_execution_context(
            ServiceBuilderConfig::default(),
            ServiceComponents::in_memory(),
            handle_executor(),
        )
        .unwrap();

        let a = builder.storage_factory().unwrap();
        let b = builder.storage_factory().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let r1 = builder.container_registry().unwrap();
        let r2 = builder.container_registry().unwrap();
        assert!(Arc::ptr_eq(&r1, &r2));
        builder.close().await;
    }

    #[tokio::test]
    async fn container_factory_builds_dependencies_in_order() {
        let builder = ServiceBuilder::with_execution_context(
            ServiceBuilderConfig::default(),
            ServiceComponents::in_memory(),
            handle_executor(),
        )
        .unwrap();
        assert!(builder.initialized_components().is_empty());

        builder.container_factory().unwrap();
        assert_eq!(
            builder.initialized_components(),
            vec![
                "metadata_repository",
                "read_index_factory",
                "storage_factory",
                "data_log_factory",
                "operation_log_factory",
                "container_factory",
            ]
        );
        builder.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let executor = handle_executor();
        let builder = ServiceBuilder::with_execution_context(
            ServiceBuilderConfig::default(),
            ServiceComponents::in_memory(),
            Arc::clone(&executor),
        )
        .unwrap();
        builder.container_manager().unwrap();

        builder.close().await;
        builder.close().await;
        assert!(builder.is_closed());
        assert!(executor.is_shutdown());
        assert!(builder.initialized_components().is_empty());
        assert!(matches!(
            builder.metadata_repository(),
            Err(SegmentStoreError::BuilderClosed)
        ));
        assert!(matches!(
            builder.create_segment_service(),
            Err(SegmentStoreError::BuilderClosed)
        ));
    }

    #[tokio::test]
    async fn creator_errors_are_wrapped() {
        let components = ServiceComponents::in_memory().with_storage_factory(|_| {
            Err(SegmentStoreError::Storage("unreachable".into()))
        });
        let builder = ServiceBuilder::with_execution_context(
            ServiceBuilderConfig::default(),
            components,
            handle_executor(),
        )
        .unwrap();

        assert!(matches!(
            builder.container_factory(),
            Err(SegmentStoreError::ComponentCreation {
                component: "storage_factory",
                ..
            })
        ));
        assert!(!builder.initialized_components().contains(&"container_factory"));
        builder.close().await;
    }
}
