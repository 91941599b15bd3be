//! In-memory read index.
//!
//! The read index caches the tail of each segment so reads do not have to
//! go to long-term storage. It is rebuilt from the operation log when a
//! container starts.

mod index;

pub use index::{ContainerReadIndex, ContainerReadIndexFactory, ReadIndex, ReadIndexFactory};
