//! Read index trait and default implementation.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::types::ContainerId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache of recently appended segment data for one container.
pub trait ReadIndex: Send + Sync {
    /// Adds appended bytes at `offset`.
    fn append(&self, segment: &str, offset: u64, data: &[u8]) -> SegmentStoreResult<()>;

    /// Returns exactly `len` bytes at `offset`, or `None` if the range is not
    /// fully cached.
    fn read(&self, segment: &str, offset: u64, len: usize) -> Option<Vec<u8>>;

    /// Drops everything cached for a segment.
    fn remove(&self, segment: &str);

    /// Drops everything.
    fn clear(&self);

    /// Total number of cached bytes.
    fn cached_bytes(&self) -> u64;
}

/// Produces one read index per container.
pub trait ReadIndexFactory: Send + Sync {
    /// Returns a new read index for a container.
    fn create_read_index(&self, container_id: ContainerId) -> Arc<dyn ReadIndex>;
}

/// Contiguous cached range of one segment.
#[derive(Debug, Default)]
struct CachedRange {
    start: u64,
    data: Vec<u8>,
}

impl CachedRange {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }
}

/// Default [`ReadIndex`]: one contiguous cached range per segment.
///
/// An append that does not continue the cached range replaces it.
#[derive(Debug)]
pub struct ContainerReadIndex {
    container_id: ContainerId,
    segments: RwLock<HashMap<String, CachedRange>>,
}

impl ContainerReadIndex {
    /// Creates an empty index.
    pub fn new(container_id: ContainerId) -> Self {
        Self {
            container_id,
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// The container this index belongs to.
    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }
}

impl ReadIndex for ContainerReadIndex {
    fn append(&self, segment: &str, offset: u64, data: &[u8]) -> SegmentStoreResult<()> {
        let mut segments = self.segments.write();
        let range = segments.entry(segment.to_string()).or_default();

        if range.data.is_empty() {
            range.start = offset;
        } else if offset != range.end() {
            if offset < range.end() {
                return Err(SegmentStoreError::BadOffset {
                    segment: segment.to_string(),
                    offset,
                    length: range.end(),
                });
            }
            range.start = offset;
            range.data.clear();
        }

        range.data.extend_from_slice(data);
        Ok(())
    }

    fn read(&self, segment: &str, offset: u64, len: usize) -> Option<Vec<u8>> {
        let segments = self.segments.read();
        let range = segments.get(segment)?;
        let end = offset.checked_add(len as u64)?;
        if offset < range.start || end > range.end() {
            return None;
        }
        let from = (offset - range.start) as usize;
        Some(range.data[from..from + len].to_vec())
    }

    fn remove(&self, segment: &str) {
        self.segments.write().remove(segment);
    }

    fn clear(&self) {
        self.segments.write().clear();
    }

    fn cached_bytes(&self) -> u64 {
        self.segments
            .read()
            .values()
            .map(|r| r.data.len() as u64)
            .sum()
    }
}

/// Factory for [`ContainerReadIndex`]; the builder's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerReadIndexFactory;

impl ContainerReadIndexFactory {
    /// Creates the factory.
    pub fn new() -> Self {
        Self
    }
}

impl ReadIndexFactory for ContainerReadIndexFactory {
    fn create_read_index(&self, container_id: ContainerId) -> Arc<dyn ReadIndex> {
        Arc::new(ContainerReadIndex::new(container_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_appends_are_readable() {
        let index = ContainerReadIndex::new(0);
        index.append("s", 0, b"hello").unwrap();
        index.append("s", 5, b" world").unwrap();

        assert_eq!(index.read("s", 0, 11).unwrap(), b"hello world");
        assert_eq!(index.read("s", 6, 5).unwrap(), b"world");
        assert_eq!(index.cached_bytes(), 11);
    }

    #[test]
    fn reads_outside_cache_miss() {
        let index = ContainerReadIndex::new(0);
        index.append("s", 0, b"abc").unwrap();
        assert!(index.read("s", 2, 5).is_none());
        assert!(index.read("other", 0, 1).is_none());
    }

    #[test]
    fn gap_restarts_cached_range() {
        let index = ContainerReadIndex::new(0);
        index.append("s", 0, b"abc").unwrap();
        index.append("s", 10, b"xyz").unwrap();
        assert!(index.read("s", 0, 3).is_none());
        assert_eq!(index.read("s", 10, 3).unwrap(), b"xyz");
    }

    #[test]
    fn overlapping_append_rejected() {
        let index = ContainerReadIndex::new(0);
        index.append("s", 0, b"abc").unwrap();
        assert!(matches!(
            index.append("s", 1, b"x"),
            Err(SegmentStoreError::BadOffset { .. })
        ));
    }

    #[test]
    fn remove_and_clear() {
        let index = ContainerReadIndexFactory::new().create_read_index(3);
        index.append("a", 0, b"1").unwrap();
        index.append("b", 0, b"2").unwrap();
        index.remove("a");
        assert!(index.read("a", 0, 1).is_none());
        index.clear();
        assert_eq!(index.cached_bytes(), 0);
    }
}
