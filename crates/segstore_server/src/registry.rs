//! Container registry.
//!
//! The registry tracks at most one container instance per id. The first
//! request for an id creates and starts the container on the execution
//! context; requests that arrive while startup is in flight wait on the same
//! startup instead of creating a second instance.
//!
//! ```text
//!   get_container(id) ──► slot absent ──► insert Starting(gen) ──► spawn startup
//!          │                                                         │
//!          └──► slot present ──► handle                               ▼
//!                                             create + start ──► gen still current?
//!                                                                yes: Running
//!                                                                no:  stop, OwnershipRevoked
//! ```
//!
//! Stopping a container leaves its slot in a stopping state until the
//! instance has stopped. A request that arrives meanwhile gets a new
//! startup that first waits for the old instance, so two instances of one
//! id never recover against the same log at once.

use crate::containers::{SegmentContainer, SegmentContainerFactory};
use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::executor::ExecutionContext;
use crate::types::ContainerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of a container startup, `None` while it is still running.
type StartupOutcome = Option<SegmentStoreResult<Arc<dyn SegmentContainer>>>;

enum HandleState {
    Ready(Arc<dyn SegmentContainer>),
    Pending(watch::Receiver<StartupOutcome>),
}

/// A container that is running or will be once its startup completes.
pub struct ContainerHandle {
    container_id: ContainerId,
    state: HandleState,
}

impl ContainerHandle {
    /// A handle to a running container.
    pub fn ready(container: Arc<dyn SegmentContainer>) -> Self {
        Self {
            container_id: container.id(),
            state: HandleState::Ready(container),
        }
    }

    fn pending(container_id: ContainerId, receiver: watch::Receiver<StartupOutcome>) -> Self {
        Self {
            container_id,
            state: HandleState::Pending(receiver),
        }
    }

    /// The container id.
    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    /// Returns true if the container is known to be running.
    pub fn is_ready(&self) -> bool {
        match &self.state {
            HandleState::Ready(_) => true,
            HandleState::Pending(receiver) => matches!(&*receiver.borrow(), Some(Ok(_))),
        }
    }

    /// Waits for startup to finish.
    ///
    /// Dropping the returned future stops waiting but does not cancel the
    /// startup itself.
    ///
    /// # Errors
    ///
    /// Returns the startup error, or
    /// [`SegmentStoreError::OwnershipRevoked`] if the container was stopped
    /// before its startup completed.
    pub async fn wait(self) -> SegmentStoreResult<Arc<dyn SegmentContainer>> {
        let container_id = self.container_id;
        match self.state {
            HandleState::Ready(container) => Ok(container),
            HandleState::Pending(mut receiver) => {
                let outcome = match receiver.wait_for(Option::is_some).await {
                    Ok(outcome) => outcome.clone(),
                    Err(_) => None,
                };
                outcome.unwrap_or_else(|| {
                    Err(SegmentStoreError::startup_failed(
                        container_id,
                        "startup abandoned",
                    ))
                })
            }
        }
    }
}

impl std::fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("container_id", &self.container_id)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Result of a non-creating registry lookup.
pub enum ContainerLookup {
    /// The container is running.
    Ready(Arc<dyn SegmentContainer>),
    /// The container is starting.
    Starting(ContainerHandle),
    /// The registry does not track the container.
    NotOwned,
}

impl ContainerLookup {
    /// Returns true for [`ContainerLookup::NotOwned`].
    pub fn is_not_owned(&self) -> bool {
        matches!(self, ContainerLookup::NotOwned)
    }
}

/// Tracks the running containers of this process.
#[async_trait]
pub trait SegmentContainerRegistry: Send + Sync {
    /// Returns a handle to the container, creating and starting it on first
    /// use. Concurrent calls for the same id share one startup.
    ///
    /// # Errors
    ///
    /// Fails after [`close`](Self::close) or if the startup cannot be
    /// scheduled.
    fn get_container(&self, container_id: ContainerId) -> SegmentStoreResult<ContainerHandle>;

    /// Looks up a container without creating it.
    fn lookup_container(&self, container_id: ContainerId) -> ContainerLookup;

    /// Stops and forgets a container, returning once the instance has
    /// stopped. A container still starting is stopped as soon as its
    /// startup completes. Stopping an unknown id succeeds.
    async fn stop_container(&self, container_id: ContainerId) -> SegmentStoreResult<()>;

    /// Number of tracked containers, running or starting.
    fn container_count(&self) -> usize;

    /// Stops every tracked container, including ones still starting, and
    /// refuses new ones. Idempotent.
    async fn close(&self) -> SegmentStoreResult<()>;
}

enum SlotState {
    Starting(watch::Receiver<StartupOutcome>),
    Running(Arc<dyn SegmentContainer>),
    /// The instance is being stopped. Resolves once it is.
    Stopping(watch::Receiver<StartupOutcome>),
}

struct Slot {
    generation: u64,
    state: SlotState,
}

type Slots = Arc<Mutex<HashMap<ContainerId, Slot>>>;

/// Waits until the instance behind `receiver` has started and been stopped,
/// or failed to start.
async fn wait_settled(mut receiver: watch::Receiver<StartupOutcome>) {
    // A dropped sender also means nothing is running any more.
    let _ = receiver.wait_for(Option::is_some).await;
}

/// Default [`SegmentContainerRegistry`].
///
/// Startups run on the shared execution context. The slot map lock is only
/// held for map updates, never across container construction or an await.
///
/// At most one instance per id is alive at a time: a slot stays in place,
/// marked stopping, until its instance has stopped, and a startup requested
/// meanwhile waits for that before creating the next instance.
pub struct StreamSegmentContainerRegistry {
    factory: Arc<dyn SegmentContainerFactory>,
    executor: Arc<dyn ExecutionContext>,
    slots: Slots,
    next_generation: AtomicU64,
    closed: AtomicBool,
}

impl StreamSegmentContainerRegistry {
    /// Creates an empty registry.
    pub fn new(
        factory: Arc<dyn SegmentContainerFactory>,
        executor: Arc<dyn ExecutionContext>,
    ) -> Self {
        Self {
            factory,
            executor,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// The factory used to create containers.
    pub fn container_factory(&self) -> &Arc<dyn SegmentContainerFactory> {
        &self.factory
    }

    /// Returns true once [`close`](SegmentContainerRegistry::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn remove_if_current(slots: &Slots, container_id: ContainerId, generation: u64) {
        let mut slots = slots.lock();
        if slots
            .get(&container_id)
            .is_some_and(|slot| slot.generation == generation)
        {
            slots.remove(&container_id);
        }
    }

    /// Returns true if `generation` still owns the id and was not asked to
    /// stop.
    fn is_starting(slots: &Slots, container_id: ContainerId, generation: u64) -> bool {
        slots.lock().get(&container_id).is_some_and(|slot| {
            slot.generation == generation && matches!(slot.state, SlotState::Starting(_))
        })
    }

    async fn run_startup(
        container_id: ContainerId,
        generation: u64,
        factory: Arc<dyn SegmentContainerFactory>,
        slots: Slots,
        previous: Option<watch::Receiver<StartupOutcome>>,
        sender: watch::Sender<StartupOutcome>,
    ) {
        if let Some(previous) = previous {
            tracing::debug!(container_id, generation, "waiting for previous instance to stop");
            wait_settled(previous).await;
        }

        if !Self::is_starting(&slots, container_id, generation) {
            Self::remove_if_current(&slots, container_id, generation);
            tracing::debug!(container_id, generation, "startup cancelled before creation");
            sender.send_replace(Some(Err(SegmentStoreError::OwnershipRevoked { container_id })));
            return;
        }

        let started = match factory.create_container(container_id) {
            Ok(container) => {
                let started = container.start().await;
                started.map(|()| container)
            }
            Err(e) => Err(e),
        };

        let outcome = match started {
            Ok(container) => {
                let current = {
                    let mut slots = slots.lock();
                    match slots.get_mut(&container_id) {
                        Some(slot)
                            if slot.generation == generation
                                && matches!(slot.state, SlotState::Starting(_)) =>
                        {
                            slot.state = SlotState::Running(Arc::clone(&container));
                            true
                        }
                        _ => false,
                    }
                };

                if current {
                    tracing::info!(container_id, "container started");
                    Ok(container)
                } else {
                    tracing::info!(container_id, "container stopped during startup");
                    if let Err(e) = container.stop().await {
                        tracing::warn!(container_id, error = %e, "failed to stop revoked container");
                    }
                    Self::remove_if_current(&slots, container_id, generation);
                    Err(SegmentStoreError::OwnershipRevoked { container_id })
                }
            }
            Err(e) => {
                Self::remove_if_current(&slots, container_id, generation);
                tracing::warn!(container_id, error = %e, "container startup failed");
                Err(match e {
                    SegmentStoreError::ContainerStartupFailed { .. } => e,
                    other => SegmentStoreError::startup_failed(container_id, other.to_string()),
                })
            }
        };

        sender.send_replace(Some(outcome));
    }
}

#[async_trait]
impl SegmentContainerRegistry for StreamSegmentContainerRegistry {
    fn get_container(&self, container_id: ContainerId) -> SegmentStoreResult<ContainerHandle> {
        let (generation, previous, sender, receiver) = {
            let mut slots = self.slots.lock();
            // Checked under the lock so close() cannot drain in between.
            if self.is_closed() {
                return Err(SegmentStoreError::BuilderClosed);
            }

            let previous = match slots.get(&container_id) {
                Some(Slot {
                    state: SlotState::Running(container),
                    ..
                }) => return Ok(ContainerHandle::ready(Arc::clone(container))),
                Some(Slot {
                    state: SlotState::Starting(receiver),
                    ..
                }) => return Ok(ContainerHandle::pending(container_id, receiver.clone())),
                Some(Slot {
                    state: SlotState::Stopping(receiver),
                    ..
                }) => Some(receiver.clone()),
                None => None,
            };

            let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
            let (sender, receiver) = watch::channel(None);
            slots.insert(
                container_id,
                Slot {
                    generation,
                    state: SlotState::Starting(receiver.clone()),
                },
            );
            (generation, previous, sender, receiver)
        };

        tracing::debug!(container_id, generation, "scheduling container startup");
        let task = Self::run_startup(
            container_id,
            generation,
            Arc::clone(&self.factory),
            Arc::clone(&self.slots),
            previous,
            sender,
        );
        if let Err(e) = self.executor.spawn(Box::pin(task)) {
            Self::remove_if_current(&self.slots, container_id, generation);
            return Err(e);
        }

        Ok(ContainerHandle::pending(container_id, receiver))
    }

    fn lookup_container(&self, container_id: ContainerId) -> ContainerLookup {
        match self.slots.lock().get(&container_id) {
            Some(Slot {
                state: SlotState::Running(container),
                ..
            }) => ContainerLookup::Ready(Arc::clone(container)),
            Some(Slot {
                state: SlotState::Starting(receiver),
                ..
            }) => ContainerLookup::Starting(ContainerHandle::pending(container_id, receiver.clone())),
            Some(Slot {
                state: SlotState::Stopping(_),
                ..
            })
            | None => ContainerLookup::NotOwned,
        }
    }

    async fn stop_container(&self, container_id: ContainerId) -> SegmentStoreResult<()> {
        enum Pending {
            Running(u64, Arc<dyn SegmentContainer>, watch::Sender<StartupOutcome>),
            Settling(watch::Receiver<StartupOutcome>),
        }

        let pending = {
            let mut slots = self.slots.lock();
            match slots.get_mut(&container_id) {
                Some(slot) => match &slot.state {
                    SlotState::Running(container) => {
                        let container = Arc::clone(container);
                        let (sender, receiver) = watch::channel(None);
                        slot.state = SlotState::Stopping(receiver);
                        Some(Pending::Running(slot.generation, container, sender))
                    }
                    // The startup task sees the stopping slot and stops the
                    // instance once it exists.
                    SlotState::Starting(receiver) => {
                        let receiver = receiver.clone();
                        slot.state = SlotState::Stopping(receiver.clone());
                        Some(Pending::Settling(receiver))
                    }
                    SlotState::Stopping(receiver) => Some(Pending::Settling(receiver.clone())),
                },
                None => None,
            }
        };

        match pending {
            Some(Pending::Running(generation, container, sender)) => {
                let stopped = container.stop().await;
                Self::remove_if_current(&self.slots, container_id, generation);
                sender.send_replace(Some(Err(SegmentStoreError::OwnershipRevoked {
                    container_id,
                })));
                tracing::info!(container_id, "container stopped");
                stopped
            }
            Some(Pending::Settling(receiver)) => {
                tracing::debug!(container_id, "stop requested during startup");
                wait_settled(receiver).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn container_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| !matches!(slot.state, SlotState::Stopping(_)))
            .count()
    }

    async fn close(&self) -> SegmentStoreResult<()> {
        let drained: Vec<(ContainerId, Slot)> = {
            let mut slots = self.slots.lock();
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            slots.drain().collect()
        };

        let mut first_error = None;
        for (container_id, slot) in drained {
            match slot.state {
                SlotState::Running(container) => {
                    if let Err(e) = container.stop().await {
                        tracing::warn!(container_id, error = %e, "failed to stop container");
                        first_error.get_or_insert(e);
                    }
                }
                // With the slot gone the startup task stops its instance.
                SlotState::Starting(receiver) | SlotState::Stopping(receiver) => {
                    wait_settled(receiver).await;
                }
            }
        }

        tracing::info!("container registry closed");
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::ContainerState;
    use crate::executor::RuntimeHandleExecutor;
    use crate::types::{ReadResult, SegmentProperties};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct TestContainer {
        id: ContainerId,
        state: parking_lot::RwLock<ContainerState>,
        start_delay: Duration,
        fail_start: bool,
    }

    #[async_trait]
    impl SegmentContainer for TestContainer {
        fn id(&self) -> ContainerId {
            self.id
        }

        fn state(&self) -> ContainerState {
            *self.state.read()
        }

        async fn start(&self) -> SegmentStoreResult<()> {
            tokio::time::sleep(self.start_delay).await;
            if self.fail_start {
                *self.state.write() = ContainerState::Failed;
                return Err(SegmentStoreError::DataLog("boom".into()));
            }
            *self.state.write() = ContainerState::Running;
            Ok(())
        }

        async fn stop(&self) -> SegmentStoreResult<()> {
            *self.state.write() = ContainerState::Stopped;
            Ok(())
        }

        async fn create_segment(&self, _segment: &str) -> SegmentStoreResult<()> {
            Ok(())
        }

        async fn append(&self, _segment: &str, _data: Vec<u8>) -> SegmentStoreResult<u64> {
            Ok(0)
        }

        async fn read(
            &self,
            _segment: &str,
            offset: u64,
            _max_length: usize,
        ) -> SegmentStoreResult<ReadResult> {
            Ok(ReadResult {
                offset,
                data: Vec::new(),
                end_of_segment: false,
            })
        }

        async fn get_segment_info(&self, segment: &str) -> SegmentStoreResult<SegmentProperties> {
            Ok(SegmentProperties::new(segment))
        }

        async fn seal_segment(&self, _segment: &str) -> SegmentStoreResult<u64> {
            Ok(0)
        }

        async fn delete_segment(&self, _segment: &str) -> SegmentStoreResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestFactory {
        created: AtomicUsize,
        start_delay: Duration,
        fail_start: bool,
    }

    impl SegmentContainerFactory for TestFactory {
        fn create_container(
            &self,
            container_id: ContainerId,
        ) -> SegmentStoreResult<Arc<dyn SegmentContainer>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(TestContainer {
                id: container_id,
                state: parking_lot::RwLock::new(ContainerState::Created),
                start_delay: self.start_delay,
                fail_start: self.fail_start,
            }))
        }
    }

    fn registry(factory: Arc<TestFactory>) -> StreamSegmentContainerRegistry {
        StreamSegmentContainerRegistry::new(
            factory,
            Arc::new(RuntimeHandleExecutor::current().unwrap()),
        )
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_startup() {
        let factory = Arc::new(TestFactory {
            start_delay: Duration::from_millis(50),
            ..Default::default()
        });
        let registry = registry(Arc::clone(&factory));

        let first = registry.get_container(2).unwrap();
        let second = registry.get_container(2).unwrap();
        assert!(!first.is_ready());

        let a = first.wait().await.unwrap();
        let b = second.wait().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.container_count(), 1);

        let third = registry.get_container(2).unwrap();
        assert!(third.is_ready());
    }

    #[tokio::test]
    async fn lookup_has_three_outcomes() {
        let factory = Arc::new(TestFactory {
            start_delay: Duration::from_millis(50),
            ..Default::default()
        });
        let registry = registry(factory);

        assert!(registry.lookup_container(0).is_not_owned());

        let handle = registry.get_container(0).unwrap();
        assert!(matches!(
            registry.lookup_container(0),
            ContainerLookup::Starting(_)
        ));

        handle.wait().await.unwrap();
        assert!(matches!(
            registry.lookup_container(0),
            ContainerLookup::Ready(_)
        ));
    }

    #[tokio::test]
    async fn stop_during_startup_revokes_ownership() {
        let factory = Arc::new(TestFactory {
            start_delay: Duration::from_millis(50),
            ..Default::default()
        });
        let registry = registry(factory);

        let handle = registry.get_container(1).unwrap();
        registry.stop_container(1).await.unwrap();
        assert_eq!(
            handle.wait().await.err(),
            Some(SegmentStoreError::OwnershipRevoked { container_id: 1 })
        );
        assert!(registry.lookup_container(1).is_not_owned());
    }

    #[tokio::test]
    async fn failed_startup_is_reported_and_forgotten() {
        let factory = Arc::new(TestFactory {
            fail_start: true,
            ..Default::default()
        });
        let registry = registry(Arc::clone(&factory));

        let result = registry.get_container(0).unwrap().wait().await;
        assert!(matches!(
            result,
            Err(SegmentStoreError::ContainerStartupFailed { container_id: 0, .. })
        ));
        assert_eq!(registry.container_count(), 0);

        // A later request tries again.
        let _ = registry.get_container(0).unwrap().wait().await;
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stop_running_container() {
        let registry = registry(Arc::new(TestFactory::default()));
        let container = registry.get_container(3).unwrap().wait().await.unwrap();

        registry.stop_container(3).await.unwrap();
        assert_eq!(container.state(), ContainerState::Stopped);
        registry.stop_container(3).await.unwrap();
    }

    #[tokio::test]
    async fn close_stops_everything() {
        let registry = registry(Arc::new(TestFactory::default()));
        let a = registry.get_container(0).unwrap().wait().await.unwrap();
        let b = registry.get_container(1).unwrap().wait().await.unwrap();

        registry.close().await.unwrap();
        registry.close().await.unwrap();
        assert_eq!(a.state(), ContainerState::Stopped);
        assert_eq!(b.state(), ContainerState::Stopped);
        assert_eq!(registry.container_count(), 0);
        assert!(matches!(
            registry.get_container(0),
            Err(SegmentStoreError::BuilderClosed)
        ));
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_slot() {
        let executor = Arc::new(RuntimeHandleExecutor::current().unwrap());
        executor.shutdown();
        let registry =
            StreamSegmentContainerRegistry::new(Arc::new(TestFactory::default()), executor);

        assert_eq!(
            registry.get_container(0).err(),
            Some(SegmentStoreError::ExecutorShutdown)
        );
        assert!(registry.lookup_container(0).is_not_owned());
    }
}
