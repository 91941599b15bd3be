//! Container manager.
//!
//! The manager decides which containers this process owns and drives the
//! registry to start and stop them.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::registry::SegmentContainerRegistry;
use crate::types::ContainerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Assigns containers to this process.
#[async_trait]
pub trait SegmentContainerManager: Send + Sync {
    /// Starts the containers this process owns and waits up to `timeout`
    /// for them to run.
    async fn initialize(&self, timeout: Duration) -> SegmentStoreResult<()>;

    /// Returns true if this process owns the container.
    fn is_owned(&self, container_id: ContainerId) -> bool;

    /// Owned container ids in ascending order.
    fn owned_containers(&self) -> Vec<ContainerId>;

    /// Stops every owned container. Idempotent.
    async fn close(&self) -> SegmentStoreResult<()>;
}

/// Single-process manager: owns every container id.
pub struct LocalSegmentContainerManager {
    registry: Arc<dyn SegmentContainerRegistry>,
    container_count: u32,
    owned: Mutex<BTreeSet<ContainerId>>,
    closed: AtomicBool,
}

impl LocalSegmentContainerManager {
    /// Creates a manager for ids `0..container_count`.
    pub fn new(registry: Arc<dyn SegmentContainerRegistry>, container_count: u32) -> Self {
        Self {
            registry,
            container_count,
            owned: Mutex::new(BTreeSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// The registry this manager drives.
    pub fn registry(&self) -> &Arc<dyn SegmentContainerRegistry> {
        &self.registry
    }
}

#[async_trait]
impl SegmentContainerManager for LocalSegmentContainerManager {
    async fn initialize(&self, timeout: Duration) -> SegmentStoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SegmentStoreError::BuilderClosed);
        }

        let mut handles = Vec::with_capacity(self.container_count as usize);
        for container_id in 0..self.container_count {
            handles.push(self.registry.get_container(container_id)?);
            self.owned.lock().insert(container_id);
        }

        tracing::info!(containers = self.container_count, "starting containers");
        let all_started = async {
            for handle in handles {
                handle.wait().await?;
            }
            Ok::<(), SegmentStoreError>(())
        };
        tokio::time::timeout(timeout, all_started)
            .await
            .map_err(|_| SegmentStoreError::Timeout)?
    }

    fn is_owned(&self, container_id: ContainerId) -> bool {
        self.owned.lock().contains(&container_id)
    }

    fn owned_containers(&self) -> Vec<ContainerId> {
        self.owned.lock().iter().copied().collect()
    }

    async fn close(&self) -> SegmentStoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let owned: Vec<ContainerId> = std::mem::take(&mut *self.owned.lock())
            .into_iter()
            .collect();
        let mut first_error = None;
        for container_id in owned {
            if let Err(e) = self.registry.stop_container(container_id).await {
                tracing::warn!(container_id, error = %e, "failed to stop container");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("container manager closed");
        first_error.map_or(Ok(()), Err)
    }
}
