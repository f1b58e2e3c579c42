use certcache_domain::CacheConfig;
use certcache_infrastructure::CertCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodically evicts expired certificates and enforces the cache budget.
///
/// Lookups only drop expired entries they happen to touch; this job sweeps
/// the rest.
pub struct PruneJob {
    cache: CertCache,
    interval_secs: u64,
    shutdown: CancellationToken,
}

impl PruneJob {
    pub fn new(cache: CertCache) -> Self {
        Self {
            cache,
            interval_secs: 300,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(cache: CertCache, config: &CacheConfig) -> Self {
        Self::new(cache).with_interval(config.normalized().prune_interval_secs)
    }

    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// One prune pass. Returns the number of evicted certificates.
    pub fn run_once(&self) -> usize {
        let evicted = self.cache.prune();
        debug!(
            evicted = evicted,
            count = self.cache.len(),
            size = self.cache.size(),
            "Prune pass completed"
        );
        evicted
    }

    pub async fn start(self: Arc<Self>) {
        info!(
            interval_secs = self.interval_secs,
            "Starting certificate prune job"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("PruneJob: shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if self.cache.is_closed() {
                            info!("PruneJob: cache closed, stopping");
                            break;
                        }
                        self.run_once();
                    }
                }
            }
        });
    }
}
