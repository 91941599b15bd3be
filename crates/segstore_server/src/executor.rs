//! Shared execution context for asynchronous subsystem work.
//!
//! Every component receives the context as an explicit
//! `Arc<dyn ExecutionContext>` handle. Only the service builder shuts it
//! down, as the last step of its own shutdown.

use crate::error::{SegmentStoreError, SegmentStoreResult};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::{Handle, Runtime};

/// A unit of background work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A pool that runs background tasks for every subsystem.
pub trait ExecutionContext: Send + Sync {
    /// Schedules a task.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentStoreError::ExecutorShutdown`] after [`shutdown`](Self::shutdown).
    fn spawn(&self, task: Task) -> SegmentStoreResult<()>;

    /// Stops accepting work and releases the pool. Idempotent.
    fn shutdown(&self);

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    fn is_shutdown(&self) -> bool;
}

/// A bounded pool backed by a dedicated multi-threaded tokio runtime.
pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    threads: usize,
    shut_down: AtomicBool,
}

impl WorkerPool {
    /// Starts a pool with `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns an error if `threads` is zero or the runtime cannot start.
    pub fn new(threads: usize) -> SegmentStoreResult<Self> {
        if threads == 0 {
            return Err(SegmentStoreError::invalid_config(
                "thread_pool_size must be greater than zero",
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("segstore-worker")
            .enable_all()
            .build()
            .map_err(|e| SegmentStoreError::invalid_config(format!("worker pool: {e}")))?;
        let handle = runtime.handle().clone();

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            threads,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn release_runtime(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            // Does not block, so it is safe inside another runtime.
            runtime.shutdown_background();
        }
    }
}

impl ExecutionContext for WorkerPool {
    fn spawn(&self, task: Task) -> SegmentStoreResult<()> {
        if self.is_shutdown() {
            return Err(SegmentStoreError::ExecutorShutdown);
        }
        self.handle.spawn(task);
        Ok(())
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::debug!(threads = self.threads, "shutting down worker pool");
        }
        self.release_runtime();
    }

    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.release_runtime();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("shut_down", &self.is_shutdown())
            .finish()
    }
}

/// Runs tasks on a runtime owned by someone else.
///
/// Shutting it down only refuses further work; the runtime itself is left
/// running. Useful for embedding and for tests.
#[derive(Debug)]
pub struct RuntimeHandleExecutor {
    handle: Handle,
    shut_down: AtomicBool,
}

impl RuntimeHandleExecutor {
    /// Wraps the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Wraps the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn current() -> SegmentStoreResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SegmentStoreError::invalid_config(format!("no tokio runtime: {e}")))
    }
}

impl ExecutionContext for RuntimeHandleExecutor {
    fn spawn(&self, task: Task) -> SegmentStoreResult<()> {
        if self.is_shutdown() {
            return Err(SegmentStoreError::ExecutorShutdown);
        }
        self.handle.spawn(task);
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn zero_threads_rejected() {
        assert!(WorkerPool::new(0).is_err());
    }

    #[tokio::test]
    async fn worker_pool_runs_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = oneshot::channel();
        pool.spawn(Box::pin(async move {
            let _ = tx.send(7);
        }))
        .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
        pool.shutdown();
    }

    #[tokio::test]
    async fn worker_pool_shutdown_is_idempotent() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert_eq!(
            pool.spawn(Box::pin(async {})),
            Err(SegmentStoreError::ExecutorShutdown)
        );
    }

    #[tokio::test]
    async fn handle_executor_refuses_work_after_shutdown() {
        let executor = RuntimeHandleExecutor::current().unwrap();
        let (tx, rx) = oneshot::channel();
        executor
            .spawn(Box::pin(async move {
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();

        executor.shutdown();
        assert!(executor.spawn(Box::pin(async {})).is_err());
    }

    #[test]
    fn handle_executor_needs_runtime() {
        assert!(RuntimeHandleExecutor::current().is_err());
    }
}
