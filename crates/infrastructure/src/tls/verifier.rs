use super::crypto_provider;
use certcache_application::ports::CertificateVerifier;
use certcache_domain::{CacheError, Certificate};
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::UnixTime;
use rustls::server::ParsedCertificate;
use rustls::RootCertStore;
use std::sync::Arc;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Default verifier: validity window, plus the webpki chain check when roots
/// are available.
///
/// No hostname binding is done here. One entry serves every name it carries
/// and the cache decides which names map to it.
#[derive(Debug, Clone)]
pub struct WebPkiVerifier {
    provider: Arc<CryptoProvider>,
}

impl WebPkiVerifier {
    pub fn new() -> Self {
        Self::with_provider(crypto_provider())
    }

    pub fn with_provider(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }

    fn check_validity(leaf: &[u8]) -> Result<(), CacheError> {
        let (_, parsed) = X509Certificate::from_der(leaf)
            .map_err(|e| CacheError::Verification(format!("malformed certificate: {e}")))?;

        let validity = parsed.validity();
        if !validity.is_valid() {
            return Err(CacheError::Verification(format!(
                "certificate is not valid now (not before {}, not after {})",
                validity.not_before, validity.not_after
            )));
        }
        Ok(())
    }
}

impl Default for WebPkiVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateVerifier for WebPkiVerifier {
    fn verify(
        &self,
        certificate: &Certificate,
        roots: Option<&RootCertStore>,
    ) -> Result<(), CacheError> {
        let leaf = certificate.leaf().ok_or(CacheError::EmptyCertificate)?;
        Self::check_validity(leaf.as_ref())?;

        let Some(roots) = roots else {
            return Ok(());
        };

        let parsed = ParsedCertificate::try_from(leaf)
            .map_err(|e| CacheError::Verification(e.to_string()))?;
        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            roots,
            certificate.intermediates(),
            UnixTime::now(),
            self.provider.signature_verification_algorithms.all,
        )
        .map_err(|e| CacheError::Verification(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::test_support::{expired_certificate, self_signed, with_validity};
    use time::{Duration, OffsetDateTime};

    #[test]
    fn test_valid_certificate_without_roots() {
        let cert = self_signed(&["a.example"]);

        assert!(WebPkiVerifier::new().verify(&cert, None).is_ok());
    }

    #[test]
    fn test_expired_certificate_is_rejected() {
        let cert = expired_certificate(&["a.example"]);

        let err = WebPkiVerifier::new().verify(&cert, None).unwrap_err();

        assert!(err.to_string().contains("not valid now"));
    }

    #[test]
    fn test_not_yet_valid_certificate_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let cert = with_validity(&["a.example"], now + Duration::days(1), now + Duration::days(2));

        assert!(WebPkiVerifier::new().verify(&cert, None).is_err());
    }

    #[test]
    fn test_untrusted_chain_is_rejected() {
        let cert = self_signed(&["a.example"]);
        let other = self_signed(&["root.example"]);
        let mut roots = RootCertStore::empty();
        roots.add(other.chain[0].clone()).unwrap();

        let result = WebPkiVerifier::new().verify(&cert, Some(&roots));

        assert!(matches!(result, Err(CacheError::Verification(_))));
    }
}
