//! Segment name to container routing.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::types::ContainerId;
use sha2::{Digest, Sha256};

/// Seed mixed into every hash so the mapping is independent of other
/// name hashes in the system.
const HASH_SEED: &[u8] = b"SegmentToContainerMapper";

/// Maps segment names to the id of the container that owns them.
///
/// The mapping is a pure function of `(segment_name, container_count)`:
/// the first eight bytes of `SHA-256(seed || name)`, read big-endian,
/// modulo the container count. Segments are physically partitioned by this
/// mapping, so it must never change for a deployed container count.
///
/// # Example
///
/// ```
/// use segstore_server::SegmentToContainerMapper;
///
/// let mapper = SegmentToContainerMapper::new(4).unwrap();
/// let id = mapper.container_id("scope/stream/0");
/// assert!(id < 4);
/// assert_eq!(id, mapper.container_id("scope/stream/0"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentToContainerMapper {
    container_count: u32,
}

impl SegmentToContainerMapper {
    /// Creates a mapper for the given number of containers.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentStoreError::InvalidConfig`] if `container_count` is zero.
    pub fn new(container_count: u32) -> SegmentStoreResult<Self> {
        if container_count == 0 {
            return Err(SegmentStoreError::invalid_config(
                "container_count must be greater than zero",
            ));
        }
        Ok(Self { container_count })
    }

    /// Returns the number of containers.
    pub fn container_count(&self) -> u32 {
        self.container_count
    }

    /// Returns the id of the container that owns `segment_name`.
    pub fn container_id(&self, segment_name: &str) -> ContainerId {
        let mut hasher = Sha256::new();
        hasher.update(HASH_SEED);
        hasher.update(segment_name.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let hash = u64::from_be_bytes(prefix);

        // The result is below container_count, which is a u32.
        (hash % u64::from(self.container_count)) as ContainerId
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_containers_rejected() {
        assert!(matches!(
            SegmentToContainerMapper::new(0),
            Err(SegmentStoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn single_container_maps_everything_to_zero() {
        let mapper = SegmentToContainerMapper::new(1).unwrap();
        for name in ["", "a", "scope/stream/1", "ü"] {
            assert_eq!(mapper.container_id(name), 0);
        }
    }

    #[test]
    fn mapping_is_stable_across_instances() {
        let a = SegmentToContainerMapper::new(4).unwrap();
        let b = SegmentToContainerMapper::new(4).unwrap();
        assert_eq!(a.container_id("abc"), b.container_id("abc"));
    }

    #[test]
    fn names_spread_across_containers() {
        const COUNT: u32 = 8;
        const SAMPLE: usize = 16_000;
        let mapper = SegmentToContainerMapper::new(COUNT).unwrap();
        let mut buckets = vec![0usize; COUNT as usize];
        for i in 0..SAMPLE {
            let name = format!("scope/stream-{}/segment-{}", i % 97, i);
            buckets[mapper.container_id(&name) as usize] += 1;
        }

        let expected = SAMPLE / COUNT as usize;
        let tolerance = expected / 5; // 20%
        for (id, count) in buckets.iter().enumerate() {
            assert!(
                count.abs_diff(expected) <= tolerance,
                "container {id} got {count} names, expected about {expected}"
            );
        }
    }

    proptest! {
        #[test]
        fn container_id_is_in_range(name in ".{0,64}", count in 1u32..1024) {
            let mapper = SegmentToContainerMapper::new(count).unwrap();
            prop_assert!(mapper.container_id(&name) < count);
        }

        #[test]
        fn container_id_is_deterministic(name in ".{0,64}", count in 1u32..1024) {
            let mapper = SegmentToContainerMapper::new(count).unwrap();
            prop_assert_eq!(mapper.container_id(&name), mapper.container_id(&name));
        }
    }
}
