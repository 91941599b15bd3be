//! Default segment container.

use crate::containers::{ContainerState, SegmentContainer};
use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::executor::ExecutionContext;
use crate::logs::{Operation, OperationLog};
use crate::metadata::ContainerMetadata;
use crate::reading::ReadIndex;
use crate::storage::Storage;
use crate::types::{ContainerId, ReadResult, SegmentProperties};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Container that logs every mutation before applying it.
///
/// - `start` resets metadata and the read index, then replays the operation
///   log to rebuild them
/// - appends are cached in the read index
/// - sealing copies the segment to storage on the execution context; reads
///   fall back to storage when the read index misses
pub struct StreamSegmentContainer {
    id: ContainerId,
    metadata: Arc<ContainerMetadata>,
    operation_log: Arc<dyn OperationLog>,
    read_index: Arc<dyn ReadIndex>,
    storage: Arc<dyn Storage>,
    executor: Arc<dyn ExecutionContext>,
    state: RwLock<ContainerState>,
    /// Serializes mutations so log order matches apply order.
    write_lock: tokio::sync::Mutex<()>,
}

impl StreamSegmentContainer {
    /// Creates a container in the `Created` state.
    pub fn new(
        id: ContainerId,
        metadata: Arc<ContainerMetadata>,
        operation_log: Arc<dyn OperationLog>,
        read_index: Arc<dyn ReadIndex>,
        storage: Arc<dyn Storage>,
        executor: Arc<dyn ExecutionContext>,
    ) -> Self {
        Self {
            id,
            metadata,
            operation_log,
            read_index,
            storage,
            executor,
            state: RwLock::new(ContainerState::Created),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn ensure_running(&self) -> SegmentStoreResult<()> {
        if self.state.read().is_running() {
            Ok(())
        } else {
            Err(SegmentStoreError::ContainerNotRunning {
                container_id: self.id,
            })
        }
    }

    fn set_state(&self, state: ContainerState) {
        *self.state.write() = state;
    }

    async fn recover(&self) -> SegmentStoreResult<usize> {
        self.metadata.reset();
        self.read_index.clear();

        let operations = self.operation_log.recover().await?;
        let count = operations.len();
        for operation in &operations {
            self.apply(operation).await?;
        }
        Ok(count)
    }

    /// Applies a logged operation. Used both live and during recovery, so
    /// storage side effects tolerate being repeated.
    async fn apply(&self, operation: &Operation) -> SegmentStoreResult<()> {
        match operation {
            Operation::CreateSegment { segment } => self.metadata.create(segment),
            Operation::Append {
                segment,
                offset,
                data,
            } => {
                self.metadata.record_append(segment, data.len() as u64)?;
                self.read_index.append(segment, *offset, data)
            }
            Operation::Seal { segment } => {
                let props = self.metadata.seal(segment)?;
                self.flush_to_storage(&props).await
            }
            Operation::Delete { segment } => {
                self.metadata.delete(segment)?;
                self.read_index.remove(segment);
                if self.storage.exists(segment) {
                    self.storage.delete(segment)?;
                }
                Ok(())
            }
        }
    }

    /// Runs the storage copy of a sealed segment on the execution context and
    /// waits for it.
    async fn flush_to_storage(&self, props: &SegmentProperties) -> SegmentStoreResult<()> {
        let storage = Arc::clone(&self.storage);
        let read_index = Arc::clone(&self.read_index);
        let name = props.name.clone();
        let length = props.length;
        let (sender, receiver) = oneshot::channel();

        self.executor.spawn(Box::pin(async move {
            let copied = copy_to_storage(storage.as_ref(), read_index.as_ref(), &name, length);
            let _ = sender.send(copied);
        }))?;

        receiver
            .await
            .map_err(|_| SegmentStoreError::ExecutorShutdown)?
    }

    async fn log_and_apply(&self, operation: Operation) -> SegmentStoreResult<()> {
        self.operation_log.add(&operation).await?;
        self.apply(&operation).await
    }
}

/// Brings the stored copy of `name` up to `length` bytes and seals it.
/// Bytes already in storage are not written again.
fn copy_to_storage(
    storage: &dyn Storage,
    read_index: &dyn ReadIndex,
    name: &str,
    length: u64,
) -> SegmentStoreResult<()> {
    if !storage.exists(name) {
        storage.create(name)?;
    }

    let stored = storage.length(name)?;
    if stored < length {
        let missing = (length - stored) as usize;
        let data = read_index.read(name, stored, missing).ok_or_else(|| {
            SegmentStoreError::Storage(format!(
                "segment {name}: bytes {stored}..{length} are not cached"
            ))
        })?;
        storage.write(name, stored, &data)?;
    }

    storage.seal(name)
}

#[async_trait]
impl SegmentContainer for StreamSegmentContainer {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn state(&self) -> ContainerState {
        *self.state.read()
    }

    async fn start(&self) -> SegmentStoreResult<()> {
        {
            let mut state = self.state.write();
            if *state != ContainerState::Created {
                return Err(SegmentStoreError::startup_failed(
                    self.id,
                    format!("cannot start from state {:?}", *state),
                ));
            }
            *state = ContainerState::Starting;
        }

        match self.recover().await {
            Ok(operations) => {
                self.set_state(ContainerState::Running);
                tracing::info!(
                    container_id = self.id,
                    operations,
                    segments = self.metadata.segment_count(),
                    "container recovered"
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(ContainerState::Failed);
                self.operation_log.close();
                tracing::warn!(container_id = self.id, error = %e, "container recovery failed");
                Err(SegmentStoreError::startup_failed(self.id, e.to_string()))
            }
        }
    }

    async fn stop(&self) -> SegmentStoreResult<()> {
        {
            let mut state = self.state.write();
            if state.is_terminal() || *state == ContainerState::Stopping {
                return Ok(());
            }
            *state = ContainerState::Stopping;
        }

        // Let an in-flight mutation finish before the log goes away.
        let _guard = self.write_lock.lock().await;
        self.operation_log.close();
        self.set_state(ContainerState::Stopped);
        tracing::info!(container_id = self.id, "container stopped");
        Ok(())
    }

    async fn create_segment(&self, segment: &str) -> SegmentStoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_running()?;
        if self.metadata.get(segment).is_some() {
            return Err(SegmentStoreError::SegmentExists {
                segment: segment.to_string(),
            });
        }
        self.log_and_apply(Operation::CreateSegment {
            segment: segment.to_string(),
        })
        .await
    }

    async fn append(&self, segment: &str, data: Vec<u8>) -> SegmentStoreResult<u64> {
        let _guard = self.write_lock.lock().await;
        self.ensure_running()?;
        let props = self.metadata.require(segment)?;
        if props.sealed {
            return Err(SegmentStoreError::SegmentSealed {
                segment: segment.to_string(),
            });
        }
        let offset = props.length;
        self.log_and_apply(Operation::Append {
            segment: segment.to_string(),
            offset,
            data,
        })
        .await?;
        Ok(offset)
    }

    async fn read(
        &self,
        segment: &str,
        offset: u64,
        max_length: usize,
    ) -> SegmentStoreResult<ReadResult> {
        self.ensure_running()?;
        let props = self.metadata.require(segment)?;
        if offset > props.length {
            return Err(SegmentStoreError::BadOffset {
                segment: segment.to_string(),
                offset,
                length: props.length,
            });
        }

        let available = props.length - offset;
        let len = available.min(max_length as u64) as usize;
        let data = if len == 0 {
            Vec::new()
        } else {
            match self.read_index.read(segment, offset, len) {
                Some(data) => data,
                None => self.storage.read(segment, offset, len)?,
            }
        };

        Ok(ReadResult {
            offset,
            end_of_segment: props.sealed && offset + len as u64 == props.length,
            data,
        })
    }

    async fn get_segment_info(&self, segment: &str) -> SegmentStoreResult<SegmentProperties> {
        self.ensure_running()?;
        self.metadata.require(segment)
    }

    async fn seal_segment(&self, segment: &str) -> SegmentStoreResult<u64> {
        let _guard = self.write_lock.lock().await;
        self.ensure_running()?;
        let props = self.metadata.require(segment)?;
        if !props.sealed {
            self.log_and_apply(Operation::Seal {
                segment: segment.to_string(),
            })
            .await?;
        }
        Ok(props.length)
    }

    async fn delete_segment(&self, segment: &str) -> SegmentStoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_running()?;
        self.metadata.require(segment)?;
        self.log_and_apply(Operation::Delete {
            segment: segment.to_string(),
        })
        .await
    }
}
