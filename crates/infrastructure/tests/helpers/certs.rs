use certcache_domain::Certificate;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

// ============================================================================
// Self-signed leaves (no chain verification)
// ============================================================================

pub fn self_signed(names: &[&str]) -> Certificate {
    let now = OffsetDateTime::now_utc();
    certificate_with_validity(names, now - Duration::days(1), now + Duration::days(30))
}

pub fn certificate_with_validity(
    names: &[&str],
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
) -> Certificate {
    let mut params = leaf_params(names);
    params.not_before = not_before;
    params.not_after = not_after;

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    bundle(cert.der().clone(), &key)
}

// ============================================================================
// Private CA for chain verification and handshakes
// ============================================================================

pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new() -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, "certcache test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn issue(&self, names: &[&str]) -> Certificate {
        let now = OffsetDateTime::now_utc();
        self.issue_with_validity(names, now - Duration::days(1), now + Duration::days(30))
    }

    pub fn issue_with_validity(
        &self,
        names: &[&str],
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Certificate {
        let mut params = leaf_params(names);
        params.not_before = not_before;
        params.not_after = not_after;
        params.use_authority_key_identifier_extension = true;

        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        bundle(cert.der().clone(), &key)
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn roots(&self) -> Arc<RootCertStore> {
        let mut roots = RootCertStore::empty();
        roots.add(self.der()).unwrap();
        Arc::new(roots)
    }
}

fn leaf_params(names: &[&str]) -> CertificateParams {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let mut params = CertificateParams::new(names).unwrap();
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params
}

fn bundle(der: CertificateDer<'static>, key: &KeyPair) -> Certificate {
    Certificate::new(
        vec![der],
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
    )
}
