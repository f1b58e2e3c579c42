use super::flight::{SingleFlight, Ticket};
use super::index::{Index, Linked};
use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::tls::entry::Entry;
use crate::tls::notifier::Notifier;
use crate::tls::verifier::WebPkiVerifier;
use crate::tls::panic_message;
use certcache_application::ports::{
    CacheEventHandler, CertificateRequest, CertificateSource, CertificateVerifier,
    NoopEventHandler,
};
use certcache_application::RequestContext;
use certcache_domain::{CacheConfig, CacheError, Certificate, Hostname};
use futures::FutureExt;
use rustls::sign::CertifiedKey;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Outcome = Result<Arc<CertifiedKey>, CacheError>;

#[derive(Debug, Clone, Copy)]
enum EvictionCause {
    Expired,
    /// Outside its validity window but not past `not_after`.
    NotYetValid,
    Capacity,
    Removed,
}

impl EvictionCause {
    fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::Capacity => "capacity",
            Self::Removed => "removed",
        }
    }

    /// Stale entries are only "expired" once `not_after` has passed.
    fn of(self, entry: &Entry, now: SystemTime) -> Self {
        match self {
            Self::Expired if entry.not_after() > now => Self::NotYetValid,
            cause => cause,
        }
    }
}

pub struct CertCacheBuilder {
    source: Arc<dyn CertificateSource>,
    config: CacheConfig,
    verifier: Option<Arc<dyn CertificateVerifier>>,
    handler: Option<Arc<dyn CacheEventHandler>>,
}

impl CertCacheBuilder {
    pub fn new(source: Arc<dyn CertificateSource>) -> Self {
        Self {
            source,
            config: CacheConfig::default(),
            verifier: None,
            handler: None,
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CertificateVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn CacheEventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the cache. Spawns the notifier workers, so it must run inside a
    /// tokio runtime.
    pub fn build(self) -> CertCache {
        let config = self.config.normalized();

        info!(
            max_size = config.max_size,
            max_workers = config.max_workers,
            "Initializing certificate cache"
        );

        CertCache {
            inner: Arc::new(CacheInner {
                index: Mutex::new(Index::new()),
                flights: SingleFlight::new(),
                source: self.source,
                verifier: self
                    .verifier
                    .unwrap_or_else(|| Arc::new(WebPkiVerifier::new())),
                handler: self.handler.unwrap_or_else(|| Arc::new(NoopEventHandler)),
                notifier: Notifier::new(config.max_workers),
                max_size: config.max_size,
                metrics: CacheMetrics::default(),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

/// TLS certificate cache keyed by server name.
///
/// Lookups try the exact name, then the one-level wildcard. Misses are
/// resolved through the upstream [`CertificateSource`] with at most one fetch
/// per name in flight. Cloning is cheap and shares the cache.
#[derive(Clone)]
pub struct CertCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    index: Mutex<Index>,
    flights: SingleFlight<Outcome>,
    source: Arc<dyn CertificateSource>,
    verifier: Arc<dyn CertificateVerifier>,
    handler: Arc<dyn CacheEventHandler>,
    notifier: Notifier,
    max_size: usize,
    metrics: CacheMetrics,
    shutdown: CancellationToken,
}

impl CertCache {
    pub fn builder(source: Arc<dyn CertificateSource>) -> CertCacheBuilder {
        CertCacheBuilder::new(source)
    }

    /// Certificate for `hostname`, fetching it on a miss.
    ///
    /// `hostname` may carry a port or brackets. Returns the context's error if
    /// it is cancelled or times out first; the shared fetch keeps running for
    /// the other waiters.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        hostname: &str,
    ) -> Result<Arc<CertifiedKey>, CacheError> {
        let name = Hostname::parse(hostname)?;
        self.resolve(ctx, name).await
    }

    /// Entry point for a TLS handshake: SNI name, else the local IP.
    pub async fn get_certificate(
        &self,
        request: &CertificateRequest,
        ctx: &RequestContext,
    ) -> Result<Arc<CertifiedKey>, CacheError> {
        let name = request.hostname()?;
        self.resolve(ctx, name).await
    }

    /// Cache-only lookup. Touches on a hit and never fetches.
    pub fn peek(&self, hostname: &str) -> Option<Arc<CertifiedKey>> {
        if self.is_closed() {
            return None;
        }
        let name = Hostname::parse(hostname).ok()?;

        let found = self.inner.lookup(&name);
        match &found {
            Some(_) => CacheMetrics::incr(&self.inner.metrics.hits),
            None => CacheMetrics::incr(&self.inner.metrics.misses),
        }
        found
    }

    async fn resolve(&self, ctx: &RequestContext, name: Hostname) -> Outcome {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        ctx.check()?;

        if let Some(certificate) = self.inner.lookup(&name) {
            CacheMetrics::incr(&self.inner.metrics.hits);
            debug!(hostname = %name, "Certificate cache HIT");
            return Ok(certificate);
        }
        CacheMetrics::incr(&self.inner.metrics.misses);
        debug!(hostname = %name, "Certificate cache MISS");

        let key: Arc<str> = Arc::from(name.as_str());
        let flight = match self.inner.flights.join(&key) {
            Ticket::Leader(flight, tx) => {
                tokio::spawn(Arc::clone(&self.inner).fetch(name, key, tx));
                flight
            }
            Ticket::Follower(flight) => flight,
        };

        tokio::select! {
            outcome = flight.wait() => outcome.unwrap_or_else(|| {
                Err(CacheError::Upstream("fetch ended without a result".to_string()))
            }),
            err = ctx.done() => Err(err),
            _ = self.inner.shutdown.cancelled() => Err(CacheError::Closed),
        }
    }

    /// Verify `certificate` and add it without going through the source.
    pub fn insert(&self, certificate: Certificate) -> Result<Arc<CertifiedKey>, CacheError> {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        let roots = self.inner.source.trust_roots();
        let entry = Entry::build(certificate, roots.as_deref(), self.inner.verifier.as_ref())?;
        Ok(self.inner.link(Arc::new(entry)))
    }

    /// Evict every entry indexed under the exact name `hostname`.
    pub fn remove(&self, hostname: &str) -> Result<usize, CacheError> {
        let name = Hostname::parse(hostname)?;
        let mut index = self.inner.lock_index();
        let removed = index.unlink_name(name.as_str());
        let count = removed.len();
        self.inner.evicted(removed, EvictionCause::Removed);
        Ok(count)
    }

    /// Evict expired entries, then least recently used ones until the cache
    /// fits its budget. Returns the number of evicted entries.
    pub fn prune(&self) -> usize {
        let mut index = self.inner.lock_index();
        let evicted = self.inner.prune_locked(&mut index, None);
        let (count, size) = (index.len(), index.size());
        drop(index);

        if evicted > 0 {
            info!(evicted = evicted, count = count, size = size, "Pruned certificate cache");
        }
        evicted
    }

    pub fn prune_expired(&self) -> usize {
        let mut index = self.inner.lock_index();
        let expired = index.pop_expired(SystemTime::now());
        let evicted = expired.len();
        self.inner.evicted(expired, EvictionCause::Expired);
        drop(index);

        if evicted > 0 {
            info!(evicted = evicted, "Pruned expired certificates");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.lock_index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes accounted to cached entries.
    pub fn size(&self) -> usize {
        self.inner.lock_index().size()
    }

    /// Bytes left before the budget is reached.
    pub fn available(&self) -> usize {
        self.inner.max_size.saturating_sub(self.size())
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Hostnames with an upstream fetch in progress.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.pending()
    }

    /// Release every waiter with [`CacheError::Closed`], then stop the
    /// notifier once its queued callbacks have run.
    ///
    /// Fetches already running finish in the background but nobody waits on
    /// them. Later calls fail with `Closed`.
    pub async fn close(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.flights.clear();
        self.inner.notifier.close().await;

        info!(count = self.len(), "Certificate cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for CertCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.inner.lock_index();
        f.debug_struct("CertCache")
            .field("count", &index.len())
            .field("size", &index.size())
            .field("max_size", &self.inner.max_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CacheInner {
    fn lock_index(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, name: &Hostname) -> Option<Arc<CertifiedKey>> {
        let mut expired = Vec::new();
        let mut index = self.lock_index();
        let found = index.lookup(name, SystemTime::now(), &mut expired);
        self.evicted(expired, EvictionCause::Expired);
        found.map(|entry| entry.certified_key())
    }

    async fn fetch(
        self: Arc<Self>,
        name: Hostname,
        key: Arc<str>,
        tx: watch::Sender<Option<Outcome>>,
    ) {
        let outcome = AssertUnwindSafe(self.fetch_entry(&name))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(CacheError::Panicked(panic_message(panic.as_ref()))));

        if let Err(e) = &outcome {
            CacheMetrics::incr(&self.metrics.fetch_failures);
            warn!(hostname = %name, error = %e, "Certificate fetch failed");
        }

        self.flights.complete(&key, &tx, outcome);
    }

    async fn fetch_entry(&self, name: &Hostname) -> Outcome {
        // another cycle may have linked it between our miss and this fetch
        if let Some(certificate) = self.lookup(name) {
            return Ok(certificate);
        }
        if self.shutdown.is_cancelled() {
            return Err(CacheError::Closed);
        }

        CacheMetrics::incr(&self.metrics.fetches);
        let certificate = self.source.get_certificate(name).await?;
        let roots = self.source.trust_roots();
        let entry = Entry::build(certificate, roots.as_deref(), self.verifier.as_ref())?;

        Ok(self.link(Arc::new(entry)))
    }

    /// Link `entry`, or reuse the resident entry with the same content.
    fn link(&self, entry: Arc<Entry>) -> Arc<CertifiedKey> {
        let mut index = self.lock_index();

        match index.link(Arc::clone(&entry)) {
            Linked::Existing(existing) => {
                index.touch(&existing.hash());
                debug!(hash = %existing.hash(), "Certificate already cached");
                existing.certified_key()
            }
            Linked::Inserted => {
                CacheMetrics::incr(&self.metrics.insertions);
                self.notify_add(&entry);
                debug!(
                    name = %entry.primary_name(),
                    size = entry.size(),
                    count = index.len(),
                    "Certificate cached"
                );

                if index.size() > self.max_size {
                    self.prune_locked(&mut index, Some(&entry));
                }
                entry.certified_key()
            }
        }
    }

    /// Two-phase prune under the index lock. `keep` is never evicted.
    fn prune_locked(&self, index: &mut Index, keep: Option<&Arc<Entry>>) -> usize {
        let expired = index.pop_expired(SystemTime::now());
        let mut evicted = expired.len();
        self.evicted(expired, EvictionCause::Expired);

        let keep = keep.map(|entry| entry.hash());
        while index.size() > self.max_size {
            let Some(victim) = index.pop_lru(keep.as_ref()) else {
                break;
            };
            self.evicted(vec![victim], EvictionCause::Capacity);
            evicted += 1;
        }
        evicted
    }

    /// Count and notify entries that were just unlinked.
    ///
    /// Called with the index lock held so add/evict tasks for one entry are
    /// queued in the order the mutations happened.
    fn evicted(&self, entries: Vec<Arc<Entry>>, cause: EvictionCause) {
        if entries.is_empty() {
            return;
        }
        CacheMetrics::add(&self.metrics.evictions, entries.len());

        let now = SystemTime::now();
        for entry in entries {
            let cause = cause.of(&entry, now);
            if matches!(cause, EvictionCause::Expired) {
                CacheMetrics::incr(&self.metrics.expirations);
            }
            debug!(
                name = %entry.primary_name(),
                cause = cause.as_str(),
                "Certificate evicted"
            );

            let handler = Arc::clone(&self.handler);
            let event = entry.event();
            self.notifier
                .emit(entry.hash().shard(), move || handler.on_evict(&event));
        }
    }

    fn notify_add(&self, entry: &Entry) {
        let handler = Arc::clone(&self.handler);
        let event = entry.event();
        self.notifier
            .emit(entry.hash().shard(), move || handler.on_add(&event));
    }
}
