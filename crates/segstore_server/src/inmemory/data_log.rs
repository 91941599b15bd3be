//! In-memory durable data log.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::logs::{DurableDataLog, DurableDataLogFactory, LogEntry};
use crate::types::ContainerId;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An in-memory [`DurableDataLog`].
///
/// Entries live as long as the log object. Closing only refuses further
/// appends, so a log handed out again by its factory still has its entries.
#[derive(Debug)]
pub struct InMemoryDurableDataLog {
    container_id: ContainerId,
    entries: RwLock<Vec<LogEntry>>,
    open: AtomicBool,
}

impl InMemoryDurableDataLog {
    /// Creates an empty, unopened log.
    #[must_use]
    pub fn new(container_id: ContainerId) -> Self {
        Self {
            container_id,
            entries: RwLock::new(Vec::new()),
            open: AtomicBool::new(false),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns true between `initialize` and `close`.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableDataLog for InMemoryDurableDataLog {
    async fn initialize(&self) -> SegmentStoreResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn append(&self, data: Vec<u8>) -> SegmentStoreResult<u64> {
        if !self.is_open() {
            return Err(SegmentStoreError::DataLog(format!(
                "log for container {} is not open",
                self.container_id
            )));
        }
        let mut entries = self.entries.write();
        let sequence = entries.len() as u64 + 1;
        entries.push(LogEntry { sequence, data });
        Ok(sequence)
    }

    async fn read_all(&self) -> SegmentStoreResult<Vec<LogEntry>> {
        Ok(self.entries.read().clone())
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Hands out one [`InMemoryDurableDataLog`] per container and keeps it for
/// the factory's lifetime, so a restarted container sees its earlier entries.
#[derive(Debug, Default)]
pub struct InMemoryDurableDataLogFactory {
    logs: Mutex<HashMap<ContainerId, Arc<InMemoryDurableDataLog>>>,
    closed: AtomicBool,
}

impl InMemoryDurableDataLogFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the log of a container if one was created.
    pub fn log(&self, container_id: ContainerId) -> Option<Arc<InMemoryDurableDataLog>> {
        self.logs.lock().get(&container_id).cloned()
    }

    /// Returns true once [`close`](DurableDataLogFactory::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DurableDataLogFactory for InMemoryDurableDataLogFactory {
    fn create_data_log(
        &self,
        container_id: ContainerId,
    ) -> SegmentStoreResult<Arc<dyn DurableDataLog>> {
        if self.is_closed() {
            return Err(SegmentStoreError::DataLog("factory is closed".to_string()));
        }
        let log: Arc<dyn DurableDataLog> = self
            .logs
            .lock()
            .entry(container_id)
            .or_insert_with(|| Arc::new(InMemoryDurableDataLog::new(container_id)))
            .clone();
        Ok(log)
    }

    fn close(&self) -> SegmentStoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        for log in self.logs.lock().values() {
            log.close();
        }
        Ok(())
    }
}
