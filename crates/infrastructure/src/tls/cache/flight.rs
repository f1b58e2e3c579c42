use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Pending fetches keyed by hostname.
///
/// The leader of a cycle owns the `watch::Sender`; every caller, leader
/// included, waits on a receiver. A waiter that gives up just drops its
/// receiver, the fetch itself is untouched.
pub(crate) struct SingleFlight<T> {
    pending: Mutex<FxHashMap<Arc<str>, watch::Receiver<Option<T>>>>,
}

pub(crate) enum Ticket<T> {
    /// First caller for the key; must fetch and call [`SingleFlight::complete`].
    Leader(Flight<T>, watch::Sender<Option<T>>),
    Follower(Flight<T>),
}

/// Handle on one resolution cycle.
pub(crate) struct Flight<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Flight<T> {
    /// The cycle's outcome, or `None` if the leader vanished without one.
    pub async fn wait(mut self) -> Option<T> {
        let delivered = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|outcome| outcome.clone());
        match delivered {
            Ok(outcome) => outcome,
            Err(_) => self.rx.borrow().clone(),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn join(&self, key: &Arc<str>) -> Ticket<T> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(rx) = pending.get(key) {
            // a dropped sender with no value means the leader died; start over
            let abandoned = rx.has_changed().is_err() && rx.borrow().is_none();
            if !abandoned {
                return Ticket::Follower(Flight { rx: rx.clone() });
            }
        }

        let (tx, rx) = watch::channel(None);
        pending.insert(Arc::clone(key), rx.clone());
        Ticket::Leader(Flight { rx }, tx)
    }

    /// Deliver the outcome and retire the cycle.
    ///
    /// The key is removed first so a caller arriving after delivery starts a
    /// fresh cycle instead of observing a finished one.
    pub fn complete(&self, key: &str, tx: &watch::Sender<Option<T>>, outcome: T) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.get(key).is_some_and(|rx| rx.same_channel(&tx.subscribe())) {
                pending.remove(key);
            }
        }
        tx.send_replace(Some(outcome));
    }

    /// Number of hostnames with a fetch in progress.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every pending cycle. Leaders still complete, nobody new joins them.
    pub fn clear(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
