//! In-memory metadata repository.

use crate::metadata::{ContainerMetadata, MetadataRepository};
use crate::types::ContainerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Keeps one [`ContainerMetadata`] per container for the repository's
/// lifetime.
#[derive(Debug, Default)]
pub struct InMemoryMetadataRepository {
    containers: Mutex<HashMap<ContainerId, Arc<ContainerMetadata>>>,
}

impl InMemoryMetadataRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers that requested metadata.
    pub fn container_count(&self) -> usize {
        self.containers.lock().len()
    }
}

impl MetadataRepository for InMemoryMetadataRepository {
    fn metadata(&self, container_id: ContainerId) -> Arc<ContainerMetadata> {
        Arc::clone(
            self.containers
                .lock()
                .entry(container_id)
                .or_insert_with(|| Arc::new(ContainerMetadata::new(container_id))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_container_same_metadata() {
        let repository = InMemoryMetadataRepository::new();
        let a = repository.metadata(1);
        let b = repository.metadata(1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.container_id(), 1);

        let c = repository.metadata(2);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(repository.container_count(), 2);
    }
}
