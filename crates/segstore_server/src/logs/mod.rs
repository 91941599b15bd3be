//! Operation logs and the durable data logs behind them.
//!
//! Every container mutation is recorded in the container's operation log
//! before it is applied. On startup the log is replayed to rebuild the
//! container's metadata and read index.
//!
//! ## Layers
//!
//! - [`DurableDataLog`] - pluggable append-only byte log, one per container
//! - [`OperationLog`] - typed operations on top of a data log
//! - [`DurableLogFactory`] - composes a [`DurableDataLogFactory`] with
//!   [`DurableLogConfig`](crate::DurableLogConfig) tuning

mod data_log;
mod durable_log;
mod operation;

pub use data_log::{DurableDataLog, DurableDataLogFactory, LogEntry};
pub use durable_log::{DurableLog, DurableLogFactory, OperationLog, OperationLogFactory};
pub use operation::{Operation, OperationBuilder, OperationSerializer, OperationType};
