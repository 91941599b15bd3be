//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Generates qualified segment names of the form `scope/stream/N`.
pub fn segment_name() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{0,7}", "[a-z][a-z0-9]{0,11}", 0u32..1000)
        .prop_map(|(scope, stream, n)| format!("{scope}/{stream}/{n}"))
}

/// Generates a container count in a realistic range.
pub fn container_count() -> impl Strategy<Value = u32> {
    1u32..=64
}

/// Generates append payloads up to `max_len` bytes.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generates a list of distinct segment names.
pub fn segment_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(segment_name(), 1..=max).prop_map(|names| names.into_iter().collect())
}
