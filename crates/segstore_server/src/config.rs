//! Service configuration.

use crate::error::{SegmentStoreError, SegmentStoreResult};

/// Process-level service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Number of segment containers. Fixed for the lifetime of a deployment,
    /// since segments are partitioned by it.
    pub container_count: u32,

    /// Number of worker threads in the shared execution context.
    pub thread_pool_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            container_count: 4,
            thread_pool_size: 4,
        }
    }
}

impl ServiceConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the container count.
    #[must_use]
    pub const fn container_count(mut self, count: u32) -> Self {
        self.container_count = count;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub const fn thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = size;
        self
    }
}

/// Tuning for the durable operation log.
///
/// The assembly layer forwards this value unmodified to the operation log
/// factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableLogConfig {
    /// Minimum number of commits between checkpoints.
    pub checkpoint_min_commit_count: u32,

    /// Number of commits that triggers a checkpoint.
    pub checkpoint_commit_count: u32,

    /// Total committed bytes that trigger a checkpoint.
    pub checkpoint_total_commit_length: u64,
}

impl Default for DurableLogConfig {
    fn default() -> Self {
        Self {
            checkpoint_min_commit_count: 10,
            checkpoint_commit_count: 100,
            checkpoint_total_commit_length: 256 * 1024 * 1024, // 256 MB
        }
    }
}

impl DurableLogConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum commit count between checkpoints.
    #[must_use]
    pub const fn checkpoint_min_commit_count(mut self, count: u32) -> Self {
        self.checkpoint_min_commit_count = count;
        self
    }

    /// Sets the commit count that triggers a checkpoint.
    #[must_use]
    pub const fn checkpoint_commit_count(mut self, count: u32) -> Self {
        self.checkpoint_commit_count = count;
        self
    }

    /// Sets the committed length that triggers a checkpoint.
    #[must_use]
    pub const fn checkpoint_total_commit_length(mut self, length: u64) -> Self {
        self.checkpoint_total_commit_length = length;
        self
    }
}

/// Complete configuration consumed by the service builder.
///
/// Read once when the builder is constructed and never mutated afterward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceBuilderConfig {
    /// Service settings.
    pub service: ServiceConfig,

    /// Durable log tuning.
    pub durable_log: DurableLogConfig,
}

impl ServiceBuilderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the service settings.
    #[must_use]
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }

    /// Replaces the durable log tuning.
    #[must_use]
    pub fn with_durable_log(mut self, durable_log: DurableLogConfig) -> Self {
        self.durable_log = durable_log;
        self
    }

    /// Shorthand for setting the container count.
    #[must_use]
    pub fn with_container_count(mut self, count: u32) -> Self {
        self.service.container_count = count;
        self
    }

    /// Shorthand for setting the worker pool size.
    #[must_use]
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.service.thread_pool_size = size;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentStoreError::InvalidConfig`] if the container count or
    /// the worker pool size is zero.
    pub fn validate(&self) -> SegmentStoreResult<()> {
        if self.service.container_count == 0 {
            return Err(SegmentStoreError::invalid_config(
                "container_count must be greater than zero",
            ));
        }
        if self.service.thread_pool_size == 0 {
            return Err(SegmentStoreError::invalid_config(
                "thread_pool_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServiceBuilderConfig::default();
        assert_eq!(config.service.container_count, 4);
        assert_eq!(config.service.thread_pool_size, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = ServiceBuilderConfig::new()
            .with_container_count(16)
            .with_thread_pool_size(2)
            .with_durable_log(DurableLogConfig::new().checkpoint_commit_count(7));

        assert_eq!(config.service.container_count, 16);
        assert_eq!(config.service.thread_pool_size, 2);
        assert_eq!(config.durable_log.checkpoint_commit_count, 7);
    }

    #[test]
    fn zero_containers_rejected() {
        let config = ServiceBuilderConfig::new().with_container_count(0);
        assert!(matches!(
            config.validate(),
            Err(SegmentStoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_threads_rejected() {
        let config = ServiceBuilderConfig::new().with_thread_pool_size(0);
        assert!(config.validate().is_err());
    }
}
