//! In-memory long-term storage.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::storage::{Storage, StorageFactory};
use crate::types::ContainerId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct StoredSegment {
    data: Vec<u8>,
    sealed: bool,
}

/// An in-memory [`Storage`].
///
/// # Example
///
/// ```rust
/// use segstore_server::inmemory::InMemoryStorage;
/// use segstore_server::Storage;
///
/// let storage = InMemoryStorage::new();
/// storage.create("s").unwrap();
/// storage.write("s", 0, b"abc").unwrap();
/// assert_eq!(storage.length("s").unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    segments: RwLock<HashMap<String, StoredSegment>>,
}

impl InMemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored segments.
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Returns true if the segment exists and is sealed.
    pub fn is_sealed(&self, segment: &str) -> bool {
        self.segments
            .read()
            .get(segment)
            .is_some_and(|s| s.sealed)
    }
}

fn not_found(segment: &str) -> SegmentStoreError {
    SegmentStoreError::segment_not_found(segment)
}

impl Storage for InMemoryStorage {
    fn create(&self, segment: &str) -> SegmentStoreResult<()> {
        let mut segments = self.segments.write();
        if segments.contains_key(segment) {
            return Err(SegmentStoreError::SegmentExists {
                segment: segment.to_string(),
            });
        }
        segments.insert(segment.to_string(), StoredSegment::default());
        Ok(())
    }

    fn write(&self, segment: &str, offset: u64, data: &[u8]) -> SegmentStoreResult<()> {
        let mut segments = self.segments.write();
        let stored = segments.get_mut(segment).ok_or_else(|| not_found(segment))?;
        if stored.sealed {
            return Err(SegmentStoreError::SegmentSealed {
                segment: segment.to_string(),
            });
        }
        let length = stored.data.len() as u64;
        if offset != length {
            return Err(SegmentStoreError::BadOffset {
                segment: segment.to_string(),
                offset,
                length,
            });
        }
        stored.data.extend_from_slice(data);
        Ok(())
    }

    fn read(&self, segment: &str, offset: u64, len: usize) -> SegmentStoreResult<Vec<u8>> {
        let segments = self.segments.read();
        let stored = segments.get(segment).ok_or_else(|| not_found(segment))?;
        let length = stored.data.len() as u64;
        if offset > length {
            return Err(SegmentStoreError::BadOffset {
                segment: segment.to_string(),
                offset,
                length,
            });
        }
        let start = offset as usize;
        let end = start.saturating_add(len).min(stored.data.len());
        Ok(stored.data[start..end].to_vec())
    }

    fn seal(&self, segment: &str) -> SegmentStoreResult<()> {
        let mut segments = self.segments.write();
        let stored = segments.get_mut(segment).ok_or_else(|| not_found(segment))?;
        stored.sealed = true;
        Ok(())
    }

    fn delete(&self, segment: &str) -> SegmentStoreResult<()> {
        self.segments
            .write()
            .remove(segment)
            .map(|_| ())
            .ok_or_else(|| not_found(segment))
    }

    fn exists(&self, segment: &str) -> bool {
        self.segments.read().contains_key(segment)
    }

    fn length(&self, segment: &str) -> SegmentStoreResult<u64> {
        self.segments
            .read()
            .get(segment)
            .map(|s| s.data.len() as u64)
            .ok_or_else(|| not_found(segment))
    }
}

/// Hands the same [`InMemoryStorage`] to every container.
///
/// Segment names are unique across containers, so one namespace is enough.
#[derive(Debug, Default)]
pub struct InMemoryStorageFactory {
    storage: Arc<InMemoryStorage>,
    closed: AtomicBool,
}

impl InMemoryStorageFactory {
    /// Creates a factory over empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared storage.
    pub fn storage(&self) -> &Arc<InMemoryStorage> {
        &self.storage
    }

    /// Returns true once [`close`](StorageFactory::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl StorageFactory for InMemoryStorageFactory {
    fn create_storage(&self, _container_id: ContainerId) -> SegmentStoreResult<Arc<dyn Storage>> {
        if self.is_closed() {
            return Err(SegmentStoreError::Storage("factory is closed".to_string()));
        }
        let storage: Arc<dyn Storage> = self.storage.clone();
        Ok(storage)
    }

    fn close(&self) -> SegmentStoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_must_be_contiguous() {
        let storage = InMemoryStorage::new();
        storage.create("s").unwrap();
        storage.write("s", 0, b"hello").unwrap();
        assert!(matches!(
            storage.write("s", 3, b"x"),
            Err(SegmentStoreError::BadOffset { .. })
        ));
        storage.write("s", 5, b"!").unwrap();
        assert_eq!(storage.read("s", 0, 100).unwrap(), b"hello!");
    }

    #[test]
    fn sealed_segments_reject_writes() {
        let storage = InMemoryStorage::new();
        storage.create("s").unwrap();
        storage.seal("s").unwrap();
        storage.seal("s").unwrap();
        assert!(storage.is_sealed("s"));
        assert!(matches!(
            storage.write("s", 0, b"x"),
            Err(SegmentStoreError::SegmentSealed { .. })
        ));
    }

    #[test]
    fn read_past_end_fails() {
        let storage = InMemoryStorage::new();
        storage.create("s").unwrap();
        storage.write("s", 0, b"abc").unwrap();
        assert!(storage.read("s", 3, 1).unwrap().is_empty());
        assert!(storage.read("s", 4, 1).is_err());
    }

    #[test]
    fn missing_segments() {
        let storage = InMemoryStorage::new();
        assert!(!storage.exists("s"));
        assert!(storage.length("s").is_err());
        assert!(storage.delete("s").is_err());
        assert!(storage.create("s").is_ok());
        assert!(storage.create("s").is_err());
    }

    #[test]
    fn factory_shares_one_storage() {
        let factory = InMemoryStorageFactory::new();
        let a = factory.create_storage(0).unwrap();
        let b = factory.create_storage(1).unwrap();
        a.create("s").unwrap();
        assert!(b.exists("s"));
        assert_eq!(factory.storage().segment_count(), 1);

        factory.close().unwrap();
        assert!(factory.create_storage(0).is_err());
    }
}
