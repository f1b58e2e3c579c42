use rustls::sign::CertifiedKey;
use std::sync::Arc;
use std::time::SystemTime;

/// Payload of an add or evict notification.
#[derive(Debug, Clone)]
pub struct CertificateEvent {
    /// Primary name of the entry: its first exact name, or `*` + first suffix.
    pub name: Arc<str>,
    pub certificate: Arc<CertifiedKey>,
    pub size: usize,
    pub not_after: SystemTime,
}

/// User callbacks fired asynchronously by the cache's notifier.
///
/// Both methods default to no-ops. Panics are caught and logged.
pub trait CacheEventHandler: Send + Sync {
    fn on_add(&self, _event: &CertificateEvent) {}

    fn on_evict(&self, _event: &CertificateEvent) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventHandler;

impl CacheEventHandler for NoopEventHandler {}
