//! Error types for the segment store service.

use crate::types::ContainerId;
use thiserror::Error;

/// Result type for segment store operations.
pub type SegmentStoreResult<T> = Result<T, SegmentStoreError>;

/// Errors that can occur while assembling the service or executing
/// segment operations.
///
/// Errors are `Clone` so a single container startup outcome can be handed
/// to every caller waiting on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentStoreError {
    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A required component was not supplied to the builder.
    #[error("missing required component: {component}")]
    MissingComponent {
        /// Name of the component.
        component: &'static str,
    },

    /// A component creator failed.
    #[error("failed to create {component}: {message}")]
    ComponentCreation {
        /// Name of the component.
        component: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The container is not assigned to this process.
    #[error("container {container_id} is not owned by this instance")]
    ContainerNotOwned {
        /// The container id.
        container_id: ContainerId,
    },

    /// Ownership of the container was revoked while the operation was in flight.
    #[error("ownership of container {container_id} was revoked")]
    OwnershipRevoked {
        /// The container id.
        container_id: ContainerId,
    },

    /// The container exists but is not running.
    #[error("container {container_id} is not running")]
    ContainerNotRunning {
        /// The container id.
        container_id: ContainerId,
    },

    /// The container failed to start.
    #[error("container {container_id} failed to start: {message}")]
    ContainerStartupFailed {
        /// The container id.
        container_id: ContainerId,
        /// Description of the failure.
        message: String,
    },

    /// The operation did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The execution context no longer accepts work.
    #[error("execution context is shut down")]
    ExecutorShutdown,

    /// The builder or registry has been closed.
    #[error("service builder is closed")]
    BuilderClosed,

    /// Segment does not exist.
    #[error("segment not found: {segment}")]
    SegmentNotFound {
        /// Segment name.
        segment: String,
    },

    /// Segment already exists.
    #[error("segment already exists: {segment}")]
    SegmentExists {
        /// Segment name.
        segment: String,
    },

    /// Segment is sealed and cannot be modified.
    #[error("segment is sealed: {segment}")]
    SegmentSealed {
        /// Segment name.
        segment: String,
    },

    /// An offset is outside the segment.
    #[error("bad offset {offset} for segment {segment} of length {length}")]
    BadOffset {
        /// Segment name.
        segment: String,
        /// Requested offset.
        offset: u64,
        /// Current segment length.
        length: u64,
    },

    /// The durable data log failed.
    #[error("data log error: {0}")]
    DataLog(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// An operation could not be encoded or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] segstore_wire::WireError),
}

impl SegmentStoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a segment-not-found error.
    pub fn segment_not_found(segment: impl Into<String>) -> Self {
        Self::SegmentNotFound {
            segment: segment.into(),
        }
    }

    /// Creates a startup failure error.
    pub fn startup_failed(container_id: ContainerId, message: impl Into<String>) -> Self {
        Self::ContainerStartupFailed {
            container_id,
            message: message.into(),
        }
    }

    /// Returns true if the caller should send the request to another
    /// instance rather than retry here.
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            SegmentStoreError::ContainerNotOwned { .. } | SegmentStoreError::OwnershipRevoked { .. }
        )
    }

    /// Returns true if retrying the same request here may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SegmentStoreError::Timeout
                | SegmentStoreError::ContainerNotRunning { .. }
                | SegmentStoreError::ContainerStartupFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_errors() {
        assert!(SegmentStoreError::ContainerNotOwned { container_id: 1 }.is_redirect());
        assert!(SegmentStoreError::OwnershipRevoked { container_id: 1 }.is_redirect());
        assert!(!SegmentStoreError::Timeout.is_redirect());
        assert!(!SegmentStoreError::DataLog("io".into()).is_redirect());
    }

    #[test]
    fn retryable_errors() {
        assert!(SegmentStoreError::Timeout.is_retryable());
        assert!(SegmentStoreError::startup_failed(0, "recovery").is_retryable());
        assert!(!SegmentStoreError::OwnershipRevoked { container_id: 0 }.is_retryable());
        assert!(!SegmentStoreError::segment_not_found("a").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SegmentStoreError::ContainerNotOwned { container_id: 3 };
        assert_eq!(err.to_string(), "container 3 is not owned by this instance");

        let err = SegmentStoreError::from(segstore_wire::WireError::UnexpectedEof);
        assert!(err.to_string().contains("unexpected end of input"));
    }
}
