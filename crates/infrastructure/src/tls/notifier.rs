use super::panic_message;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of workers running add/evict callbacks off the cache lock.
///
/// Each worker drains its own queue and runs one task at a time on the blocking
/// pool, so slow callbacks never hold a runtime thread. Tasks carrying the same
/// shard key land on the same worker and therefore run in submission order.
pub struct Notifier {
    senders: Mutex<Option<Vec<mpsc::UnboundedSender<Task>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shards: usize,
}

impl Notifier {
    /// Spawn `max_workers` workers (at least one) on the current runtime.
    pub fn new(max_workers: usize) -> Self {
        let shards = max_workers.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);

        for worker in 0..shards {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(worker, rx)));
        }

        Self {
            senders: Mutex::new(Some(senders)),
            workers: Mutex::new(workers),
            shards,
        }
    }

    pub fn workers(&self) -> usize {
        self.shards
    }

    /// Queue `task`. Never blocks; a no-op once the notifier is closed.
    pub fn emit<F>(&self, shard: u64, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = senders.as_ref() {
            let tx = &senders[(shard % self.shards as u64) as usize];
            let _ = tx.send(Box::new(task));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting tasks and wait for the queued ones to finish.
    pub async fn close(&self) {
        drop(
            self.senders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Notifier worker terminated abnormally");
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("workers", &self.shards)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_worker(worker: usize, mut rx: mpsc::UnboundedReceiver<Task>) {
    while let Some(task) = rx.recv().await {
        match tokio::task::spawn_blocking(task).await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                let panic = e.into_panic();
                error!(
                    worker = worker,
                    panic = %panic_message(panic.as_ref()),
                    "Certificate event callback panicked"
                );
            }
            Err(e) => {
                error!(worker = worker, error = %e, "Certificate event callback cancelled");
            }
        }
    }
    debug!(worker = worker, "Notifier worker stopped");
}
