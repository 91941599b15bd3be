//! Stub containers and a stub registry.
//!
//! Stub containers keep no data. They record every operation dispatched to
//! them so tests can check where the façade routed a request.

use crate::recording::{ReleaseLog, REGISTRY};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use segstore_server::{
    ContainerHandle, ContainerId, ContainerLookup, ContainerState, ReadResult, SegmentContainer,
    SegmentContainerFactory, SegmentContainerRegistry, SegmentProperties, SegmentStoreError,
    SegmentStoreResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// An operation received by a [`StubContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Operation name, e.g. `"append"`.
    pub operation: &'static str,
    /// Target segment.
    pub segment: String,
}

/// A container that records dispatched operations and returns canned
/// results.
#[derive(Debug)]
pub struct StubContainer {
    id: ContainerId,
    state: RwLock<ContainerState>,
    dispatched: Mutex<Vec<Dispatch>>,
    start_delay: Duration,
    operation_delay: Duration,
}

impl StubContainer {
    /// Creates a stub in the `Created` state.
    pub fn new(id: ContainerId) -> Self {
        Self {
            id,
            state: RwLock::new(ContainerState::Created),
            dispatched: Mutex::new(Vec::new()),
            start_delay: Duration::ZERO,
            operation_delay: Duration::ZERO,
        }
    }

    /// Creates a stub that is already running.
    pub fn running(id: ContainerId) -> Self {
        let stub = Self::new(id);
        *stub.state.write() = ContainerState::Running;
        stub
    }

    /// Delays `start` by `delay`.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Delays every segment operation by `delay`.
    #[must_use]
    pub fn with_operation_delay(mut self, delay: Duration) -> Self {
        self.operation_delay = delay;
        self
    }

    /// Operations received so far.
    pub fn dispatched(&self) -> Vec<Dispatch> {
        self.dispatched.lock().clone()
    }

    /// Number of operations received so far.
    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().len()
    }

    /// Moves the container out of `Running` without going through `stop`,
    /// as happens when ownership is taken away mid-operation.
    pub fn revoke(&self) {
        *self.state.write() = ContainerState::Stopped;
    }

    async fn dispatch(&self, operation: &'static str, segment: &str) -> SegmentStoreResult<()> {
        self.dispatched.lock().push(Dispatch {
            operation,
            segment: segment.to_string(),
        });
        if !self.operation_delay.is_zero() {
            tokio::time::sleep(self.operation_delay).await;
        }
        if self.state.read().is_running() {
            Ok(())
        } else {
            Err(SegmentStoreError::ContainerNotRunning {
                container_id: self.id,
            })
        }
    }
}

#[async_trait]
impl SegmentContainer for StubContainer {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn state(&self) -> ContainerState {
        *self.state.read()
    }

    async fn start(&self) -> SegmentStoreResult<()> {
        *self.state.write() = ContainerState::Starting;
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        *self.state.write() = ContainerState::Running;
        Ok(())
    }

    async fn stop(&self) -> SegmentStoreResult<()> {
        *self.state.write() = ContainerState::Stopped;
        Ok(())
    }

    async fn create_segment(&self, segment: &str) -> SegmentStoreResult<()> {
        self.dispatch("create_segment", segment).await
    }

    async fn append(&self, segment: &str, _data: Vec<u8>) -> SegmentStoreResult<u64> {
        self.dispatch("append", segment).await.map(|()| 0)
    }

    async fn read(
        &self,
        segment: &str,
        offset: u64,
        _max_length: usize,
    ) -> SegmentStoreResult<ReadResult> {
        self.dispatch("read", segment).await?;
        Ok(ReadResult {
            offset,
            data: Vec::new(),
            end_of_segment: false,
        })
    }

    async fn get_segment_info(&self, segment: &str) -> SegmentStoreResult<SegmentProperties> {
        self.dispatch("get_segment_info", segment).await?;
        Ok(SegmentProperties::new(segment))
    }

    async fn seal_segment(&self, segment: &str) -> SegmentStoreResult<u64> {
        self.dispatch("seal_segment", segment).await.map(|()| 0)
    }

    async fn delete_segment(&self, segment: &str) -> SegmentStoreResult<()> {
        self.dispatch("delete_segment", segment).await
    }
}

/// Registry that serves one running [`StubContainer`] per id.
///
/// Every id below `container_count` is owned; others are not.
pub struct StubRegistry {
    containers: Mutex<HashMap<ContainerId, Arc<StubContainer>>>,
    log: ReleaseLog,
}

impl StubRegistry {
    /// Creates a registry with running stubs for `0..container_count`.
    pub fn new(container_count: u32, log: ReleaseLog) -> Self {
        let containers = (0..container_count)
            .map(|id| (id, Arc::new(StubContainer::running(id))))
            .collect();
        Self {
            containers: Mutex::new(containers),
            log,
        }
    }

    /// The stub serving `container_id`, if owned.
    pub fn container(&self, container_id: ContainerId) -> Option<Arc<StubContainer>> {
        self.containers.lock().get(&container_id).cloned()
    }

    /// Total operations dispatched across every stub.
    pub fn total_dispatches(&self) -> usize {
        self.containers
            .lock()
            .values()
            .map(|c| c.dispatch_count())
            .sum()
    }
}

#[async_trait]
impl SegmentContainerRegistry for StubRegistry {
    fn get_container(&self, container_id: ContainerId) -> SegmentStoreResult<ContainerHandle> {
        match self.container(container_id) {
            Some(container) => Ok(ContainerHandle::ready(container)),
            None => Err(SegmentStoreError::ContainerNotOwned { container_id }),
        }
    }

    fn lookup_container(&self, container_id: ContainerId) -> ContainerLookup {
        match self.container(container_id) {
            Some(container) => ContainerLookup::Ready(container),
            None => ContainerLookup::NotOwned,
        }
    }

    async fn stop_container(&self, container_id: ContainerId) -> SegmentStoreResult<()> {
        let removed = self.containers.lock().remove(&container_id);
        if let Some(container) = removed {
            container.stop().await?;
        }
        Ok(())
    }

    fn container_count(&self) -> usize {
        self.containers.lock().len()
    }

    async fn close(&self) -> SegmentStoreResult<()> {
        self.log.record(REGISTRY);
        Ok(())
    }
}

/// Container factory that hands out [`StubContainer`]s and counts them.
#[derive(Debug, Default)]
pub struct StubContainerFactory {
    created: AtomicUsize,
    overlapping: AtomicUsize,
    start_delay: Duration,
    containers: Mutex<Vec<Arc<StubContainer>>>,
}

impl StubContainerFactory {
    /// Creates a factory whose containers start immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Containers created by this factory start after `delay`.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Number of containers created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of containers created while an earlier instance of the same
    /// id had not stopped yet.
    pub fn overlapping_creations(&self) -> usize {
        self.overlapping.load(Ordering::SeqCst)
    }

    /// Every container created so far.
    pub fn containers(&self) -> Vec<Arc<StubContainer>> {
        self.containers.lock().clone()
    }
}

impl SegmentContainerFactory for StubContainerFactory {
    fn create_container(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn SegmentContainer>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let container =
            Arc::new(StubContainer::new(container_id).with_start_delay(self.start_delay));

        let mut containers = self.containers.lock();
        if containers
            .iter()
            .any(|c| c.id == container_id && !c.state().is_terminal())
        {
            self.overlapping.fetch_add(1, Ordering::SeqCst);
        }
        containers.push(Arc::clone(&container));
        drop(containers);
        let container: Arc<dyn SegmentContainer> = container;
        Ok(container)
    }
}
