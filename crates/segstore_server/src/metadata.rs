//! Segment metadata.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::types::{ContainerId, SegmentProperties};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Store of segment metadata, shared by every container in the process.
///
/// Each container receives the metadata for its own partition.
pub trait MetadataRepository: Send + Sync {
    /// Returns the metadata of a container's partition.
    fn metadata(&self, container_id: ContainerId) -> Arc<ContainerMetadata>;
}

/// Metadata for the segments owned by one container.
#[derive(Debug)]
pub struct ContainerMetadata {
    container_id: ContainerId,
    segments: RwLock<HashMap<String, SegmentProperties>>,
}

impl ContainerMetadata {
    /// Creates empty metadata for a container.
    pub fn new(container_id: ContainerId) -> Self {
        Self {
            container_id,
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// The container this metadata belongs to.
    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    /// Returns the properties of a segment, if it exists.
    pub fn get(&self, segment: &str) -> Option<SegmentProperties> {
        self.segments.read().get(segment).cloned()
    }

    /// Returns the properties of a segment.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentStoreError::SegmentNotFound`] if it does not exist.
    pub fn require(&self, segment: &str) -> SegmentStoreResult<SegmentProperties> {
        self.get(segment)
            .ok_or_else(|| SegmentStoreError::segment_not_found(segment))
    }

    /// Registers a new, empty segment.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentStoreError::SegmentExists`] if the name is taken.
    pub fn create(&self, segment: &str) -> SegmentStoreResult<()> {
        let mut segments = self.segments.write();
        if segments.contains_key(segment) {
            return Err(SegmentStoreError::SegmentExists {
                segment: segment.to_string(),
            });
        }
        segments.insert(segment.to_string(), SegmentProperties::new(segment));
        Ok(())
    }

    /// Records `len` appended bytes and returns the new length.
    ///
    /// # Errors
    ///
    /// Fails if the segment is missing or sealed.
    pub fn record_append(&self, segment: &str, len: u64) -> SegmentStoreResult<u64> {
        let mut segments = self.segments.write();
        let props = segments
            .get_mut(segment)
            .ok_or_else(|| SegmentStoreError::segment_not_found(segment))?;
        if props.sealed {
            return Err(SegmentStoreError::SegmentSealed {
                segment: segment.to_string(),
            });
        }
        props.length += len;
        Ok(props.length)
    }

    /// Marks a segment sealed. Sealing twice is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the segment is missing.
    pub fn seal(&self, segment: &str) -> SegmentStoreResult<SegmentProperties> {
        let mut segments = self.segments.write();
        let props = segments
            .get_mut(segment)
            .ok_or_else(|| SegmentStoreError::segment_not_found(segment))?;
        props.sealed = true;
        Ok(props.clone())
    }

    /// Removes a segment.
    ///
    /// # Errors
    ///
    /// Fails if the segment is missing.
    pub fn delete(&self, segment: &str) -> SegmentStoreResult<()> {
        self.segments
            .write()
            .remove(segment)
            .map(|_| ())
            .ok_or_else(|| SegmentStoreError::segment_not_found(segment))
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Drops all entries. Called before recovery rebuilds them from the log.
    pub fn reset(&self) {
        self.segments.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_append_seal_delete() {
        let metadata = ContainerMetadata::new(2);
        metadata.create("s").unwrap();
        assert_eq!(metadata.record_append("s", 5).unwrap(), 5);
        assert_eq!(metadata.record_append("s", 3).unwrap(), 8);

        let sealed = metadata.seal("s").unwrap();
        assert!(sealed.sealed);
        assert_eq!(sealed.length, 8);
        assert!(matches!(
            metadata.record_append("s", 1),
            Err(SegmentStoreError::SegmentSealed { .. })
        ));

        metadata.delete("s").unwrap();
        assert!(metadata.get("s").is_none());
    }

    #[test]
    fn duplicate_create_fails() {
        let metadata = ContainerMetadata::new(0);
        metadata.create("s").unwrap();
        assert!(matches!(
            metadata.create("s"),
            Err(SegmentStoreError::SegmentExists { .. })
        ));
    }

    #[test]
    fn missing_segment() {
        let metadata = ContainerMetadata::new(0);
        assert!(matches!(
            metadata.require("nope"),
            Err(SegmentStoreError::SegmentNotFound { .. })
        ));
        assert!(metadata.delete("nope").is_err());
    }

    #[test]
    fn reset_clears_everything() {
        let metadata = ContainerMetadata::new(0);
        metadata.create("a").unwrap();
        metadata.create("b").unwrap();
        metadata.reset();
        assert_eq!(metadata.segment_count(), 0);
    }
}
