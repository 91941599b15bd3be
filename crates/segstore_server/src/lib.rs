//! # segstore server
//!
//! Assembly and lifecycle layer of the segment store.
//!
//! This crate provides:
//! - Segment name to container routing ([`SegmentToContainerMapper`])
//! - A shared execution context for background work
//! - Pluggable contracts for durable data logs, storage, metadata and read
//!   indexes, plus in-memory implementations of each
//! - Segment containers that log every mutation and recover from their log
//! - A container registry that starts each container at most once
//! - [`ServiceBuilder`], which wires the above together lazily and tears it
//!   down in reverse order
//! - [`StreamSegmentService`], the client-facing façade
//!
//! # Architecture
//!
//! Segments are partitioned into a fixed number of containers by a hash of
//! their name. Each container owns one operation log, one read index and
//! the metadata for its partition. A process runs the containers its
//! [`SegmentContainerManager`] assigns to it; requests for any other
//! container fail with [`SegmentStoreError::ContainerNotOwned`] so the
//! client can go elsewhere.
//!
//! # Shutdown
//!
//! [`ServiceBuilder::close`] releases the container manager, the registry,
//! the data log factory and the storage factory, in that order, and shuts
//! the execution context down last.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod builder;
mod config;
mod containers;
mod error;
mod executor;
pub mod inmemory;
mod logs;
mod manager;
mod mapper;
mod metadata;
mod reading;
mod registry;
mod service;
mod storage;
mod types;

pub use builder::{
    ComponentSetup, DataLogFactoryCreator, ManagerCreator, MetadataRepositoryCreator,
    ReadIndexFactoryCreator, RegistryCreator, ServiceBuilder, ServiceComponents,
    StorageFactoryCreator,
};
pub use config::{DurableLogConfig, ServiceBuilderConfig, ServiceConfig};
pub use containers::{
    ContainerState, SegmentContainer, SegmentContainerFactory, StreamSegmentContainer,
    StreamSegmentContainerFactory,
};
pub use error::{SegmentStoreError, SegmentStoreResult};
pub use executor::{ExecutionContext, RuntimeHandleExecutor, Task, WorkerPool};
pub use logs::{
    DurableDataLog, DurableDataLogFactory, DurableLog, DurableLogFactory, LogEntry, Operation,
    OperationBuilder, OperationLog, OperationLogFactory, OperationSerializer, OperationType,
};
pub use manager::{LocalSegmentContainerManager, SegmentContainerManager};
pub use mapper::SegmentToContainerMapper;
pub use metadata::{ContainerMetadata, MetadataRepository};
pub use reading::{ContainerReadIndex, ContainerReadIndexFactory, ReadIndex, ReadIndexFactory};
pub use registry::{
    ContainerHandle, ContainerLookup, SegmentContainerRegistry, StreamSegmentContainerRegistry,
};
pub use service::{StreamSegmentService, StreamSegmentStore};
pub use storage::{Storage, StorageFactory};
pub use types::{ContainerId, ReadResult, SegmentProperties};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
