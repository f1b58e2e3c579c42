use async_trait::async_trait;
use certcache_application::ports::{CertificateSource, CertificateVerifier};
use certcache_domain::{CacheError, Certificate, Hostname};
use rcgen::{CertificateParams, KeyPair};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use std::sync::atomic::{AtomicU64, Ordering};
use time::{Duration, OffsetDateTime};

pub(crate) fn self_signed(names: &[&str]) -> Certificate {
    let now = OffsetDateTime::now_utc();
    with_validity(names, now - Duration::days(1), now + Duration::days(30))
}

pub(crate) fn expired_certificate(names: &[&str]) -> Certificate {
    let now = OffsetDateTime::now_utc();
    with_validity(names, now - Duration::days(30), now - Duration::days(1))
}

pub(crate) fn with_validity(
    names: &[&str],
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
) -> Certificate {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let mut params = CertificateParams::new(names).unwrap();
    params.not_before = not_before;
    params.not_after = not_after;

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();

    Certificate::new(
        vec![cert.der().clone()],
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
    )
}

/// Verifier that accepts anything, for tests that build entries directly.
pub(crate) struct AcceptAll;

impl CertificateVerifier for AcceptAll {
    fn verify(&self, _: &Certificate, _: Option<&RootCertStore>) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Source that never has a certificate.
#[derive(Default)]
pub(crate) struct EmptySource {
    pub calls: AtomicU64,
}

#[async_trait]
impl CertificateSource for EmptySource {
    async fn get_certificate(&self, name: &Hostname) -> Result<Certificate, CacheError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::NotFound(name.to_string()))
    }
}
