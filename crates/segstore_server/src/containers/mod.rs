//! Segment containers.
//!
//! A container owns a disjoint partition of segments. It bundles one
//! operation log, one read index, one storage view and the metadata for its
//! partition, and executes every operation for the segments it owns.
//!
//! ## Lifecycle
//!
//! ```text
//! Created → Starting → Running → Stopping → Stopped
//!               ↓
//!             Failed
//! ```

mod factory;
mod stream_segment_container;

pub use factory::{SegmentContainerFactory, StreamSegmentContainerFactory};
pub use stream_segment_container::StreamSegmentContainer;

use crate::error::SegmentStoreResult;
use crate::types::{ContainerId, ReadResult, SegmentProperties};
use async_trait::async_trait;

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Constructed, not yet started.
    Created,
    /// Recovering from its operation log.
    Starting,
    /// Accepting operations.
    Running,
    /// Shutting down.
    Stopping,
    /// Shut down.
    Stopped,
    /// Startup failed.
    Failed,
}

impl ContainerState {
    /// Returns true if the container accepts operations.
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }

    /// Returns true if the container will never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerState::Stopped | ContainerState::Failed)
    }
}

/// A running unit that owns a partition of segments.
///
/// Segment operations fail with
/// [`ContainerNotRunning`](crate::SegmentStoreError::ContainerNotRunning)
/// unless the container is [`Running`](ContainerState::Running).
#[async_trait]
pub trait SegmentContainer: Send + Sync {
    /// The container id.
    fn id(&self) -> ContainerId;

    /// Current lifecycle state.
    fn state(&self) -> ContainerState;

    /// Recovers and starts accepting operations.
    async fn start(&self) -> SegmentStoreResult<()>;

    /// Stops the container. Idempotent.
    async fn stop(&self) -> SegmentStoreResult<()>;

    /// Creates an empty segment.
    async fn create_segment(&self, segment: &str) -> SegmentStoreResult<()>;

    /// Appends bytes and returns the offset they were written at.
    async fn append(&self, segment: &str, data: Vec<u8>) -> SegmentStoreResult<u64>;

    /// Reads up to `max_length` bytes starting at `offset`.
    async fn read(
        &self,
        segment: &str,
        offset: u64,
        max_length: usize,
    ) -> SegmentStoreResult<ReadResult>;

    /// Returns segment properties.
    async fn get_segment_info(&self, segment: &str) -> SegmentStoreResult<SegmentProperties>;

    /// Seals a segment and returns its final length.
    async fn seal_segment(&self, segment: &str) -> SegmentStoreResult<u64>;

    /// Deletes a segment.
    async fn delete_segment(&self, segment: &str) -> SegmentStoreResult<()>;
}
