//! Container registry tests under concurrency.

use segstore_server::inmemory::{InMemoryMetadataRepository, InMemoryStorageFactory};
use segstore_server::{
    ContainerLookup, ContainerReadIndexFactory, ContainerState, DurableLogConfig,
    DurableLogFactory, SegmentContainer, SegmentContainerRegistry, SegmentStoreError,
    StreamSegmentContainerFactory, StreamSegmentContainerRegistry,
};
use segstore_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn registry(factory: &Arc<StubContainerFactory>) -> Arc<StreamSegmentContainerRegistry> {
    Arc::new(StreamSegmentContainerRegistry::new(
        Arc::clone(factory) as Arc<dyn segstore_server::SegmentContainerFactory>,
        current_executor(),
    ))
}

/// Registry over real containers whose data logs are `data_logs`.
fn in_memory_registry(
    data_logs: Arc<DelayedDataLogFactory>,
) -> Arc<StreamSegmentContainerRegistry> {
    let executor = current_executor();
    let container_factory = StreamSegmentContainerFactory::new(
        Arc::new(InMemoryMetadataRepository::new()),
        Arc::new(DurableLogFactory::new(DurableLogConfig::default(), data_logs)),
        Arc::new(ContainerReadIndexFactory::new()),
        Arc::new(InMemoryStorageFactory::new()),
        Arc::clone(&executor),
        1,
    );
    Arc::new(StreamSegmentContainerRegistry::new(Arc::new(container_factory), executor))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_container_coalesces() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(50)));
    let registry = registry(&factory);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.get_container(5).unwrap().wait().await.unwrap()
        }));
    }

    let mut containers = Vec::new();
    for task in tasks {
        containers.push(task.await.unwrap());
    }

    assert_eq!(factory.created(), 1);
    for container in &containers[1..] {
        assert!(Arc::ptr_eq(&containers[0], container));
    }
    assert_eq!(containers[0].state(), ContainerState::Running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_ids_start_independently() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(20)));
    let registry = registry(&factory);

    let handles: Vec<_> = (0..8).map(|id| registry.get_container(id).unwrap()).collect();
    for (id, handle) in handles.into_iter().enumerate() {
        let container = handle.wait().await.unwrap();
        assert_eq!(container.id(), id as u32);
    }
    assert_eq!(factory.created(), 8);
    assert_eq!(registry.container_count(), 8);
}

#[tokio::test]
async fn lookup_never_creates() {
    let factory = Arc::new(StubContainerFactory::new());
    let registry = registry(&factory);

    for id in 0..4 {
        assert!(registry.lookup_container(id).is_not_owned());
    }
    assert_eq!(factory.created(), 0);
    assert_eq!(registry.container_count(), 0);
}

#[tokio::test]
async fn abandoned_wait_does_not_cancel_startup() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(100)));
    let registry = registry(&factory);

    let handle = registry.get_container(0).unwrap();
    let waited = tokio::time::timeout(Duration::from_millis(10), handle.wait()).await;
    assert!(waited.is_err());

    let container = registry.get_container(0).unwrap().wait().await.unwrap();
    assert_eq!(container.state(), ContainerState::Running);
    assert_eq!(factory.created(), 1);
    assert!(matches!(
        registry.lookup_container(0),
        ContainerLookup::Ready(_)
    ));
}

#[tokio::test]
async fn stop_during_startup_stops_the_new_instance() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(50)));
    let registry = registry(&factory);

    let handle = registry.get_container(2).unwrap();
    registry.stop_container(2).await.unwrap();

    assert_eq!(
        handle.wait().await.err(),
        Some(SegmentStoreError::OwnershipRevoked { container_id: 2 })
    );
    let created = factory.containers();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].state(), ContainerState::Stopped);

    // A new request after the stop gets a fresh instance.
    let restarted = registry.get_container(2).unwrap().wait().await.unwrap();
    assert_eq!(restarted.state(), ContainerState::Running);
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn close_during_startup_refuses_new_requests() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(50)));
    let registry = registry(&factory);

    let handle = registry.get_container(1).unwrap();
    registry.close().await.unwrap();

    assert_eq!(
        handle.wait().await.err(),
        Some(SegmentStoreError::OwnershipRevoked { container_id: 1 })
    );
    assert_eq!(
        registry.get_container(1).err(),
        Some(SegmentStoreError::BuilderClosed)
    );
    assert!(registry.lookup_container(1).is_not_owned());
}

#[tokio::test]
async fn restart_while_stopping_waits_for_the_old_instance() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(100)));
    let registry = registry(&factory);

    let first = registry.get_container(0).unwrap();
    let stopping = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.stop_container(0).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = registry.get_container(0).unwrap();

    assert_eq!(
        first.wait().await.err(),
        Some(SegmentStoreError::OwnershipRevoked { container_id: 0 })
    );
    stopping.await.unwrap().unwrap();

    let restarted = second.wait().await.unwrap();
    assert_eq!(restarted.state(), ContainerState::Running);
    assert_eq!(factory.created(), 2);
    assert_eq!(factory.overlapping_creations(), 0);
    assert_eq!(factory.containers()[0].state(), ContainerState::Stopped);
    assert!(matches!(
        registry.lookup_container(0),
        ContainerLookup::Ready(_)
    ));
}

#[tokio::test]
async fn restarted_instance_can_write_after_slow_first_open() {
    let data_logs = Arc::new(DelayedDataLogFactory::new(Duration::from_millis(100)));
    let registry = in_memory_registry(Arc::clone(&data_logs));

    let first = registry.get_container(0).unwrap();
    let stopping = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.stop_container(0).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = registry.get_container(0).unwrap();

    assert_eq!(
        first.wait().await.err(),
        Some(SegmentStoreError::OwnershipRevoked { container_id: 0 })
    );
    stopping.await.unwrap().unwrap();

    let container = second.wait().await.unwrap();
    assert_eq!(container.state(), ContainerState::Running);
    container.create_segment("s").await.unwrap();
    assert_eq!(container.append("s", b"abc".to_vec()).await.unwrap(), 0);
    assert!(data_logs.inner().log(0).unwrap().is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn get_container_racing_close_leaves_nothing_running() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(5)));
    let registry = registry(&factory);

    let mut tasks = Vec::new();
    for i in 0..32u32 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            match registry.get_container(i % 4) {
                Ok(handle) => handle.wait().await.map(|_| ()),
                Err(e) => Err(e),
            }
        }));
    }
    tokio::task::yield_now().await;
    registry.close().await.unwrap();

    // Everything created before close returned is already stopped.
    for container in factory.containers() {
        assert_eq!(container.state(), ContainerState::Stopped);
    }
    assert_eq!(registry.container_count(), 0);

    for task in tasks {
        match task.await.unwrap() {
            Ok(())
            | Err(SegmentStoreError::BuilderClosed)
            | Err(SegmentStoreError::OwnershipRevoked { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(registry.container_count(), 0);
    assert_eq!(
        registry.get_container(0).err(),
        Some(SegmentStoreError::BuilderClosed)
    );
}

#[tokio::test]
async fn close_waits_for_containers_still_starting() {
    let factory = Arc::new(StubContainerFactory::new().with_start_delay(Duration::from_millis(50)));
    let registry = registry(&factory);

    let handle = registry.get_container(1).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(factory.containers()[0].state(), ContainerState::Starting);

    registry.close().await.unwrap();
    assert_eq!(factory.containers()[0].state(), ContainerState::Stopped);
    assert_eq!(
        handle.wait().await.err(),
        Some(SegmentStoreError::OwnershipRevoked { container_id: 1 })
    );
    assert_eq!(factory.created(), 1);
}
