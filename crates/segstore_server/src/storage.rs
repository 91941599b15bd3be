//! Long-term storage contracts.

use crate::error::SegmentStoreResult;
use crate::types::ContainerId;
use std::sync::Arc;

/// Long-term (tiered) storage for segment data.
///
/// Storage is an opaque byte store keyed by segment name. Writes must be
/// contiguous: `offset` always equals the current stored length.
pub trait Storage: Send + Sync {
    /// Creates an empty segment. Creating an existing segment is an error.
    fn create(&self, segment: &str) -> SegmentStoreResult<()>;

    /// Writes `data` at `offset`.
    fn write(&self, segment: &str, offset: u64, data: &[u8]) -> SegmentStoreResult<()>;

    /// Reads up to `len` bytes starting at `offset`.
    fn read(&self, segment: &str, offset: u64, len: usize) -> SegmentStoreResult<Vec<u8>>;

    /// Seals a segment. Sealing twice is not an error.
    fn seal(&self, segment: &str) -> SegmentStoreResult<()>;

    /// Deletes a segment.
    fn delete(&self, segment: &str) -> SegmentStoreResult<()>;

    /// Returns true if the segment exists.
    fn exists(&self, segment: &str) -> bool;

    /// Returns the stored length of a segment.
    fn length(&self, segment: &str) -> SegmentStoreResult<u64>;
}

/// Produces the storage view used by each container.
pub trait StorageFactory: Send + Sync {
    /// Returns the storage adapter for a container.
    fn create_storage(&self, container_id: ContainerId) -> SegmentStoreResult<Arc<dyn Storage>>;

    /// Releases resources held by the factory.
    fn close(&self) -> SegmentStoreResult<()>;
}
