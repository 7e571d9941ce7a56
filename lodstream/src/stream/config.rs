//! Stream manager configuration.

use std::time::Duration;

use super::retry::RetryPolicy;

/// Default memory capacity for decoded assets (256 MiB).
pub const DEFAULT_CAPACITY_BYTES: u64 = 256 * 1024 * 1024;

/// Default bound on a single load before it counts as failed.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a request may stay deferred before it is given up.
pub const DEFAULT_MAX_DEFERRAL: Duration = Duration::from_secs(20);

/// Configuration for [`AssetStreamManager`](super::AssetStreamManager).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Memory capacity at the most expensive preset. Cheaper presets use a
    /// fraction of it.
    pub capacity_bytes: u64,
    pub load_timeout: Duration,
    pub max_deferral: Duration,
    pub retry: RetryPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            max_deferral: DEFAULT_MAX_DEFERRAL,
            retry: RetryPolicy::default(),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(mut self, bytes: u64) -> Self {
        self.capacity_bytes = bytes;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_max_deferral(mut self, bound: Duration) -> Self {
        self.max_deferral = bound;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
