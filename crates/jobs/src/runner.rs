use crate::PruneJob;
use std::sync::Arc;
use tracing::info;

/// Central orchestrator for background jobs.
///
/// Register jobs with the builder methods, then call `.start()` once.
///
/// ```rust,ignore
/// JobRunner::new()
///     .with_prune(PruneJob::from_config(cache.clone(), &config.cache))
///     .start()
///     .await;
/// ```
pub struct JobRunner {
    prune: Option<PruneJob>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self { prune: None }
    }

    pub fn with_prune(mut self, job: PruneJob) -> Self {
        self.prune = Some(job);
        self
    }

    /// Start all registered background jobs.
    pub async fn start(self) {
        info!("Starting background job runner");

        if let Some(job) = self.prune {
            Arc::new(job).start().await;
        }

        info!("All background jobs started");
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}
