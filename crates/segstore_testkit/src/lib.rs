//! # segstore testkit
//!
//! Test utilities for segstore.
//!
//! This crate provides:
//! - A shared [`ReleaseLog`] that records the order components are released in
//! - Recording wrappers around the pluggable subsystems
//! - Stub containers and a stub registry that count dispatched operations
//! - Builder fixtures over the in-memory subsystems
//! - Property-based generators for segment names
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segstore_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn shutdown_order() {
//!     let log = ReleaseLog::new();
//!     let builder = recording_builder(4, &log);
//!     builder.container_manager().unwrap();
//!     builder.close().await;
//!     assert_eq!(log.events(), SHUTDOWN_ORDER);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;
pub mod stub;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
    pub use crate::stub::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
pub use stub::*;
