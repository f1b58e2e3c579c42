use certcache_domain::{CacheError, Certificate};
use rustls::RootCertStore;

/// Chain-of-trust and validity check applied before a certificate is cached.
///
/// Rejections are reported as `CacheError::Verification` carrying the
/// verifier's own message.
pub trait CertificateVerifier: Send + Sync {
    fn verify(
        &self,
        certificate: &Certificate,
        roots: Option<&RootCertStore>,
    ) -> Result<(), CacheError>;
}
