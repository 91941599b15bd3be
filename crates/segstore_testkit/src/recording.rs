//! Recording wrappers around the pluggable subsystems.
//!
//! Each wrapper delegates to a real implementation and appends its
//! component name to a shared [`ReleaseLog`] when it is released.

use async_trait::async_trait;
use parking_lot::Mutex;
use segstore_server::inmemory::{InMemoryDurableDataLogFactory, InMemoryStorageFactory};
use segstore_server::{
    ContainerHandle, ContainerId, ContainerLookup, DurableDataLog, DurableDataLogFactory,
    ExecutionContext, LogEntry, RuntimeHandleExecutor, SegmentContainerManager,
    SegmentContainerRegistry, SegmentStoreResult, Storage, StorageFactory, Task,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Name recorded when the container manager is released.
pub const MANAGER: &str = "container_manager";
/// Name recorded when the container registry is released.
pub const REGISTRY: &str = "container_registry";
/// Name recorded when the data log factory is released.
pub const DATA_LOG_FACTORY: &str = "data_log_factory";
/// Name recorded when the storage factory is released.
pub const STORAGE_FACTORY: &str = "storage_factory";
/// Name recorded when the execution context is shut down.
pub const EXECUTION_CONTEXT: &str = "execution_context";

/// Expected release order when every component was built.
pub const SHUTDOWN_ORDER: [&str; 5] = [
    MANAGER,
    REGISTRY,
    DATA_LOG_FACTORY,
    STORAGE_FACTORY,
    EXECUTION_CONTEXT,
];

/// Ordered record of component releases, shared between wrappers.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLog {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl ReleaseLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a release.
    pub fn record(&self, component: &'static str) {
        self.events.lock().push(component);
    }

    /// Releases so far, oldest first.
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }

    /// How often a component was released.
    pub fn count(&self, component: &str) -> usize {
        self.events.lock().iter().filter(|e| **e == component).count()
    }
}

/// Counts how often a component creator ran.
#[derive(Debug, Clone, Default)]
pub struct CreationCounter {
    count: Arc<AtomicUsize>,
}

impl CreationCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one creation.
    pub fn hit(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of creations recorded.
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// In-memory data log factory that records its release.
#[derive(Debug)]
pub struct RecordingDataLogFactory {
    inner: InMemoryDurableDataLogFactory,
    log: ReleaseLog,
}

impl RecordingDataLogFactory {
    /// Creates the factory.
    pub fn new(log: ReleaseLog) -> Self {
        Self {
            inner: InMemoryDurableDataLogFactory::new(),
            log,
        }
    }

    /// The wrapped factory.
    pub fn inner(&self) -> &InMemoryDurableDataLogFactory {
        &self.inner
    }
}

impl DurableDataLogFactory for RecordingDataLogFactory {
    fn create_data_log(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn DurableDataLog>> {
        self.inner.create_data_log(container_id)
    }

    fn close(&self) -> SegmentStoreResult<()> {
        self.log.record(DATA_LOG_FACTORY);
        self.inner.close()
    }
}

/// In-memory data log factory whose logs are slow to open the first time.
///
/// The first log handed out for each container delays its `initialize` by
/// the configured amount. Logs handed out again for the same container open
/// immediately, so a restarted container is not slowed down.
#[derive(Debug)]
pub struct DelayedDataLogFactory {
    inner: InMemoryDurableDataLogFactory,
    delay: Duration,
    delayed: Mutex<HashSet<ContainerId>>,
}

impl DelayedDataLogFactory {
    /// Creates the factory.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryDurableDataLogFactory::new(),
            delay,
            delayed: Mutex::new(HashSet::new()),
        }
    }

    /// The wrapped factory.
    pub fn inner(&self) -> &InMemoryDurableDataLogFactory {
        &self.inner
    }
}

impl DurableDataLogFactory for DelayedDataLogFactory {
    fn create_data_log(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn DurableDataLog>> {
        let log = self.inner.create_data_log(container_id)?;
        if !self.delayed.lock().insert(container_id) {
            return Ok(log);
        }
        let log: Arc<dyn DurableDataLog> = Arc::new(DelayedDataLog {
            inner: log,
            delay: self.delay,
        });
        Ok(log)
    }

    fn close(&self) -> SegmentStoreResult<()> {
        self.inner.close()
    }
}

struct DelayedDataLog {
    inner: Arc<dyn DurableDataLog>,
    delay: Duration,
}

#[async_trait]
impl DurableDataLog for DelayedDataLog {
    async fn initialize(&self) -> SegmentStoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.initialize().await
    }

    async fn append(&self, data: Vec<u8>) -> SegmentStoreResult<u64> {
        self.inner.append(data).await
    }

    async fn read_all(&self) -> SegmentStoreResult<Vec<LogEntry>> {
        self.inner.read_all().await
    }

    fn close(&self) {
        self.inner.close();
    }
}

/// In-memory storage factory that records its release.
#[derive(Debug)]
pub struct RecordingStorageFactory {
    inner: InMemoryStorageFactory,
    log: ReleaseLog,
}

impl RecordingStorageFactory {
    /// Creates the factory.
    pub fn new(log: ReleaseLog) -> Self {
        Self {
            inner: InMemoryStorageFactory::new(),
            log,
        }
    }

    /// The wrapped factory.
    pub fn inner(&self) -> &InMemoryStorageFactory {
        &self.inner
    }
}

impl StorageFactory for RecordingStorageFactory {
    fn create_storage(&self, container_id: ContainerId) -> SegmentStoreResult<Arc<dyn Storage>> {
        self.inner.create_storage(container_id)
    }

    fn close(&self) -> SegmentStoreResult<()> {
        self.log.record(STORAGE_FACTORY);
        self.inner.close()
    }
}

/// Container manager wrapper that records its release.
pub struct RecordingContainerManager {
    inner: Arc<dyn SegmentContainerManager>,
    log: ReleaseLog,
}

impl RecordingContainerManager {
    /// Wraps a manager.
    pub fn new(inner: Arc<dyn SegmentContainerManager>, log: ReleaseLog) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl SegmentContainerManager for RecordingContainerManager {
    async fn initialize(&self, timeout: Duration) -> SegmentStoreResult<()> {
        self.inner.initialize(timeout).await
    }

    fn is_owned(&self, container_id: ContainerId) -> bool {
        self.inner.is_owned(container_id)
    }

    fn owned_containers(&self) -> Vec<ContainerId> {
        self.inner.owned_containers()
    }

    async fn close(&self) -> SegmentStoreResult<()> {
        self.log.record(MANAGER);
        self.inner.close().await
    }
}

/// Container registry wrapper that records its release.
pub struct RecordingRegistry {
    inner: Arc<dyn SegmentContainerRegistry>,
    log: ReleaseLog,
}

impl RecordingRegistry {
    /// Wraps a registry.
    pub fn new(inner: Arc<dyn SegmentContainerRegistry>, log: ReleaseLog) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl SegmentContainerRegistry for RecordingRegistry {
    fn get_container(&self, container_id: ContainerId) -> SegmentStoreResult<ContainerHandle> {
        self.inner.get_container(container_id)
    }

    fn lookup_container(&self, container_id: ContainerId) -> ContainerLookup {
        self.inner.lookup_container(container_id)
    }

    async fn stop_container(&self, container_id: ContainerId) -> SegmentStoreResult<()> {
        self.inner.stop_container(container_id).await
    }

    fn container_count(&self) -> usize {
        self.inner.container_count()
    }

    async fn close(&self) -> SegmentStoreResult<()> {
        self.log.record(REGISTRY);
        self.inner.close().await
    }
}

/// Runs tasks on the caller's runtime and records its shutdown.
#[derive(Debug)]
pub struct RecordingExecutor {
    inner: RuntimeHandleExecutor,
    log: ReleaseLog,
    spawned: AtomicUsize,
}

impl RecordingExecutor {
    /// Creates the executor on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime.
    pub fn current(log: ReleaseLog) -> Self {
        Self {
            inner: RuntimeHandleExecutor::current().expect("tokio runtime"),
            log,
            spawned: AtomicUsize::new(0),
        }
    }

    /// Number of tasks accepted so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl ExecutionContext for RecordingExecutor {
    fn spawn(&self, task: Task) -> SegmentStoreResult<()> {
        self.inner.spawn(task)?;
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) {
        if !self.inner.is_shutdown() {
            self.log.record(EXECUTION_CONTEXT);
        }
        self.inner.shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }
}
