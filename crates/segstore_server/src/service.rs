//! Segment service façade.
//!
//! Routes each request to the container that owns the segment and runs it
//! under the caller's timeout.

use crate::containers::SegmentContainer;
use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::mapper::SegmentToContainerMapper;
use crate::registry::{ContainerLookup, SegmentContainerRegistry};
use crate::types::{ContainerId, ReadResult, SegmentProperties};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound used when a timeout is too large to add to the current time.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Segment operations exposed to clients.
///
/// Every call fails with [`SegmentStoreError::ContainerNotOwned`] if this
/// process does not run the segment's container, and with
/// [`SegmentStoreError::Timeout`] if it does not finish within `timeout`.
#[async_trait]
pub trait StreamSegmentStore: Send + Sync {
    /// Creates an empty segment.
    async fn create_segment(&self, segment: &str, timeout: Duration) -> SegmentStoreResult<()>;

    /// Appends bytes and returns the offset they were written at.
    async fn append(
        &self,
        segment: &str,
        data: Vec<u8>,
        timeout: Duration,
    ) -> SegmentStoreResult<u64>;

    /// Reads up to `max_length` bytes starting at `offset`.
    async fn read(
        &self,
        segment: &str,
        offset: u64,
        max_length: usize,
        timeout: Duration,
    ) -> SegmentStoreResult<ReadResult>;

    /// Returns segment properties.
    async fn get_segment_info(
        &self,
        segment: &str,
        timeout: Duration,
    ) -> SegmentStoreResult<SegmentProperties>;

    /// Seals a segment and returns its final length.
    async fn seal_segment(&self, segment: &str, timeout: Duration) -> SegmentStoreResult<u64>;

    /// Deletes a segment.
    async fn delete_segment(&self, segment: &str, timeout: Duration) -> SegmentStoreResult<()>;
}

/// Default [`StreamSegmentStore`] over a container registry.
pub struct StreamSegmentService {
    registry: Arc<dyn SegmentContainerRegistry>,
    mapper: SegmentToContainerMapper,
}

impl StreamSegmentService {
    /// Creates the façade.
    pub fn new(registry: Arc<dyn SegmentContainerRegistry>, mapper: SegmentToContainerMapper) -> Self {
        Self { registry, mapper }
    }

    /// The mapper used for routing.
    pub fn mapper(&self) -> &SegmentToContainerMapper {
        &self.mapper
    }

    fn deadline(timeout: Duration) -> Instant {
        let now = Instant::now();
        now.checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    /// Resolves the running container for a segment, waiting for a
    /// startup in flight until `deadline`.
    async fn container_for(
        &self,
        segment: &str,
        deadline: Instant,
    ) -> SegmentStoreResult<Arc<dyn SegmentContainer>> {
        let container_id = self.mapper.container_id(segment);
        match self.registry.lookup_container(container_id) {
            ContainerLookup::Ready(container) => Ok(container),
            ContainerLookup::Starting(handle) => {
                tracing::debug!(container_id, segment, "waiting for container startup");
                tokio::time::timeout_at(deadline, handle.wait())
                    .await
                    .map_err(|_| SegmentStoreError::Timeout)?
            }
            ContainerLookup::NotOwned => {
                Err(SegmentStoreError::ContainerNotOwned { container_id })
            }
        }
    }

    async fn invoke<T, F>(
        container_id: ContainerId,
        deadline: Instant,
        operation: F,
    ) -> SegmentStoreResult<T>
    where
        F: Future<Output = SegmentStoreResult<T>>,
    {
        match tokio::time::timeout_at(deadline, operation).await {
            Ok(Err(SegmentStoreError::ContainerNotRunning { .. })) => {
                Err(SegmentStoreError::OwnershipRevoked { container_id })
            }
            Ok(result) => result,
            Err(_) => Err(SegmentStoreError::Timeout),
        }
    }
}

#[async_trait]
impl StreamSegmentStore for StreamSegmentService {
    async fn create_segment(&self, segment: &str, timeout: Duration) -> SegmentStoreResult<()> {
        let deadline = Self::deadline(timeout);
        let container = self.container_for(segment, deadline).await?;
        Self::invoke(container.id(), deadline, container.create_segment(segment)).await
    }

    async fn append(
        &self,
        segment: &str,
        data: Vec<u8>,
        timeout: Duration,
    ) -> SegmentStoreResult<u64> {
        let deadline = Self::deadline(timeout);
        let container = self.container_for(segment, deadline).await?;
        Self::invoke(container.id(), deadline, container.append(segment, data)).await
    }

    async fn read(
        &self,
        segment: &str,
        offset: u64,
        max_length: usize,
        timeout: Duration,
    ) -> SegmentStoreResult<ReadResult> {
        let deadline = Self::deadline(timeout);
        let container = self.container_for(segment, deadline).await?;
        Self::invoke(
            container.id(),
            deadline,
            container.read(segment, offset, max_length),
        )
        .await
    }

    async fn get_segment_info(
        &self,
        segment: &str,
        timeout: Duration,
    ) -> SegmentStoreResult<SegmentProperties> {
        let deadline = Self::deadline(timeout);
        let container = self.container_for(segment, deadline).await?;
        Self::invoke(container.id(), deadline, container.get_segment_info(segment)).await
    }

    async fn seal_segment(&self, segment: &str, timeout: Duration) -> SegmentStoreResult<u64> {
        let deadline = Self::deadline(timeout);
        let container = self.container_for(segment, deadline).await?;
        Self::invoke(container.id(), deadline, container.seal_segment(segment)).await
    }

    async fn delete_segment(&self, segment: &str, timeout: Duration) -> SegmentStoreResult<()> {
        let deadline = Self::deadline(timeout);
        let container = self.container_for(segment, deadline).await?;
        Self::invoke(container.id(), deadline, container.delete_segment(segment)).await
    }
}
