//! Durable data log contracts.

use crate::error::SegmentStoreResult;
use crate::types::ContainerId;
use async_trait::async_trait;
use std::sync::Arc;

/// An entry read back from a durable data log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Sequence number assigned on append, strictly increasing.
    pub sequence: u64,
    /// The appended bytes.
    pub data: Vec<u8>,
}

/// A durable, append-only log backing one container.
///
/// The log does not interpret the bytes it stores.
#[async_trait]
pub trait DurableDataLog: Send + Sync {
    /// Opens the log and recovers its state. May take arbitrarily long and
    /// may fail.
    async fn initialize(&self) -> SegmentStoreResult<()>;

    /// Appends an entry and returns its sequence number once it is durable.
    async fn append(&self, data: Vec<u8>) -> SegmentStoreResult<u64>;

    /// Reads every entry in sequence order.
    async fn read_all(&self) -> SegmentStoreResult<Vec<LogEntry>>;

    /// Closes the log. Further appends fail until it is initialized again.
    fn close(&self);
}

/// Produces one durable data log per container.
pub trait DurableDataLogFactory: Send + Sync {
    /// Returns the log for a container.
    fn create_data_log(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn DurableDataLog>>;

    /// Releases resources held by the factory.
    fn close(&self) -> SegmentStoreResult<()>;
}
