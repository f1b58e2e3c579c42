use async_trait::async_trait;
use certcache_application::ports::{CertificateSource, CertificateVerifier};
use certcache_domain::{CacheError, Certificate, Hostname};
use certcache_infrastructure::CertCache;
use rcgen::{CertificateParams, KeyPair};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

// ============================================================================
// Collaborators
// ============================================================================

/// Upstream with nothing in it; jobs tests preload the cache directly.
pub struct EmptySource;

#[async_trait]
impl CertificateSource for EmptySource {
    async fn get_certificate(&self, name: &Hostname) -> Result<Certificate, CacheError> {
        Err(CacheError::NotFound(name.to_string()))
    }
}

/// Admits expired certificates so the prune job has something to sweep.
pub struct AcceptAll;

impl CertificateVerifier for AcceptAll {
    fn verify(&self, _: &Certificate, _: Option<&RootCertStore>) -> Result<(), CacheError> {
        Ok(())
    }
}

pub fn lenient_cache() -> CertCache {
    CertCache::builder(Arc::new(EmptySource))
        .with_verifier(Arc::new(AcceptAll))
        .build()
}

// ============================================================================
// Certificates
// ============================================================================

pub fn valid_certificate(name: &str) -> Certificate {
    let now = OffsetDateTime::now_utc();
    certificate(name, now - Duration::days(1), now + Duration::days(30))
}

pub fn expired_certificate(name: &str) -> Certificate {
    let now = OffsetDateTime::now_utc();
    certificate(name, now - Duration::days(30), now - Duration::days(1))
}

fn certificate(name: &str, not_before: OffsetDateTime, not_after: OffsetDateTime) -> Certificate {
    let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
    params.not_before = not_before;
    params.not_after = not_after;

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    Certificate::new(
        vec![cert.der().clone()],
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
    )
}
