//! In-memory subsystem implementations.
//!
//! Nothing here survives the process. These back
//! [`ServiceBuilder::in_memory`](crate::ServiceBuilder::in_memory) and are
//! meant for tests, tools and local experiments.

mod data_log;
mod metadata;
mod storage;

pub use data_log::{InMemoryDurableDataLog, InMemoryDurableDataLogFactory};
pub use metadata::InMemoryMetadataRepository;
pub use storage::{InMemoryStorage, InMemoryStorageFactory};
