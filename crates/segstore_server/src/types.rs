//! Shared identifier and value types.

/// Identifier of a segment container, in `[0, container_count)`.
pub type ContainerId = u32;

/// Properties of a segment as tracked by its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentProperties {
    /// Segment name.
    pub name: String,
    /// Number of bytes appended so far.
    pub length: u64,
    /// Whether the segment is sealed.
    pub sealed: bool,
}

impl SegmentProperties {
    /// Properties of a newly created, empty segment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            length: 0,
            sealed: false,
        }
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// Offset of the first returned byte.
    pub offset: u64,
    /// The bytes read; may be shorter than requested at the end of the segment.
    pub data: Vec<u8>,
    /// True if the read reached the end of a sealed segment.
    pub end_of_segment: bool,
}
