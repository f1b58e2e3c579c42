use serde::{Deserialize, Serialize};

/// Smallest accepted cache budget, in bytes.
pub const MIN_CACHE_SIZE: usize = 1024;

/// Smallest accepted notifier pool size.
pub const MIN_WORKERS: usize = 1;

/// Certificate cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Memory budget in bytes (leaf + chain + private key DER of every entry).
    /// `0` selects the default.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Number of workers dispatching add/evict callbacks.
    /// `0` selects the default.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Interval in seconds between background prune runs.
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl CacheConfig {
    /// Apply defaults for unset values and enforce the floors.
    pub fn normalized(&self) -> Self {
        let max_size = match self.max_size {
            0 => default_max_size(),
            size => size.max(MIN_CACHE_SIZE),
        };
        let max_workers = match self.max_workers {
            0 => default_max_workers(),
            workers => workers.max(MIN_WORKERS),
        };
        let prune_interval_secs = match self.prune_interval_secs {
            0 => default_prune_interval(),
            secs => secs,
        };

        Self {
            max_size,
            max_workers,
            prune_interval_secs,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_workers: default_max_workers(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

fn default_max_size() -> usize {
    32 * 1024 * 1024
}

fn default_max_workers() -> usize {
    4
}

fn default_prune_interval() -> u64 {
    300
}
