use async_trait::async_trait;
use certcache_application::ports::{CacheEventHandler, CertificateEvent, CertificateSource};
use certcache_domain::{CacheError, Certificate, Hostname};
use rustls::RootCertStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

// ============================================================================
// Mock CertificateSource
// ============================================================================

pub struct MockCertificateSource {
    certificates: RwLock<HashMap<String, Certificate>>,
    roots: Option<Arc<RootCertStore>>,
    calls: AtomicUsize,
    active: Mutex<HashMap<String, usize>>,
    max_concurrent_same_name: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    should_fail: AtomicBool,
    should_panic: AtomicBool,
}

impl MockCertificateSource {
    pub fn new() -> Self {
        Self {
            certificates: RwLock::new(HashMap::new()),
            roots: None,
            calls: AtomicUsize::new(0),
            active: Mutex::new(HashMap::new()),
            max_concurrent_same_name: AtomicUsize::new(0),
            delay: Mutex::new(None),
            gate: Mutex::new(None),
            should_fail: AtomicBool::new(false),
            should_panic: AtomicBool::new(false),
        }
    }

    pub fn with_roots(mut self, roots: Arc<RootCertStore>) -> Self {
        self.roots = Some(roots);
        self
    }

    pub async fn set_certificate(&self, name: &str, certificate: Certificate) {
        self.certificates
            .write()
            .await
            .insert(name.to_string(), certificate);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Hold every fetch until `release` hands out permits.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_should_panic(&self, should_panic: bool) {
        self.should_panic.store(should_panic, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous fetches observed for one name.
    pub fn max_concurrent_same_name(&self) -> usize {
        self.max_concurrent_same_name.load(Ordering::SeqCst)
    }

    fn enter(&self, name: &str) {
        let mut active = self.active.lock().unwrap();
        let count = active.entry(name.to_string()).or_insert(0);
        *count += 1;
        self.max_concurrent_same_name
            .fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, name: &str) {
        let mut active = self.active.lock().unwrap();
        if let Some(count) = active.get_mut(name) {
            *count -= 1;
        }
    }
}

impl Default for MockCertificateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CertificateSource for MockCertificateSource {
    async fn get_certificate(&self, name: &Hostname) -> Result<Certificate, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enter(name.as_str());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.leave(name.as_str());

        if self.should_panic.load(Ordering::SeqCst) {
            panic!("mock source exploded for {name}");
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(CacheError::Upstream("mock source failure".to_string()));
        }

        self.certificates
            .read()
            .await
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    fn trust_roots(&self) -> Option<Arc<RootCertStore>> {
        self.roots.clone()
    }
}

// ============================================================================
// Recording CacheEventHandler
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Add(String),
    Evict(String),
}

#[derive(Default)]
pub struct RecordingEventHandler {
    events: Mutex<Vec<RecordedEvent>>,
    panic_on_add: AtomicBool,
    add_delay_ms: AtomicU64,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panicking() -> Self {
        let handler = Self::default();
        handler.panic_on_add.store(true, Ordering::SeqCst);
        handler
    }

    /// Handler whose `on_add` blocks the calling thread for `delay`.
    pub fn slow(delay: Duration) -> Self {
        let handler = Self::default();
        handler
            .add_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        handler
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn evicted(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RecordedEvent::Evict(name) => Some(name),
                RecordedEvent::Add(_) => None,
            })
            .collect()
    }

    pub fn added(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RecordedEvent::Add(name) => Some(name),
                RecordedEvent::Evict(_) => None,
            })
            .collect()
    }
}

impl CacheEventHandler for RecordingEventHandler {
    fn on_add(&self, event: &CertificateEvent) {
        if self.panic_on_add.load(Ordering::SeqCst) {
            panic!("add callback exploded");
        }
        let delay = self.add_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        self.events
            .lock()
            .unwrap()
            .push(RecordedEvent::Add(event.name.to_string()));
    }

    fn on_evict(&self, event: &CertificateEvent) {
        self.events
            .lock()
            .unwrap()
            .push(RecordedEvent::Evict(event.name.to_string()));
    }
}
