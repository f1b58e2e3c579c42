use super::crypto_provider;
use certcache_application::ports::{CertificateEvent, CertificateVerifier};
use certcache_domain::hostname::{ip_literal, normalize_dns_name};
use certcache_domain::{CacheError, Certificate};
use rustls::sign::CertifiedKey;
use rustls::{InconsistentKeys, RootCertStore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// SHA-256 of the leaf DER, the identity of a cached certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHash([u8; 32]);

impl EntryHash {
    pub fn of(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight bytes, used to route notifications to a worker.
    #[inline]
    pub fn shard(&self) -> u64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(prefix)
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryHash({self})")
    }
}

/// One verified certificate and everything the index needs to know about it.
///
/// Immutable once built. Validity is recomputed from the wall clock on every
/// call since a resident entry can expire while cached.
pub struct Entry {
    hash: EntryHash,
    size: usize,
    certified_key: Arc<CertifiedKey>,
    names: Vec<String>,
    suffixes: Vec<String>,
    not_before: SystemTime,
    not_after: SystemTime,
}

impl Entry {
    /// Verify `certificate` and derive its identity, names and size.
    ///
    /// Verification errors are returned as produced by `verifier`.
    pub fn build(
        certificate: Certificate,
        roots: Option<&RootCertStore>,
        verifier: &dyn CertificateVerifier,
    ) -> Result<Self, CacheError> {
        let leaf = certificate.leaf().ok_or(CacheError::EmptyCertificate)?;
        verifier.verify(&certificate, roots)?;

        let (_, parsed) = X509Certificate::from_der(leaf.as_ref())
            .map_err(|e| CacheError::Verification(format!("malformed certificate: {e}")))?;

        let hash = EntryHash::of(leaf.as_ref());
        let (names, suffixes) = subject_names(&parsed)?;
        let not_before = to_system_time(parsed.validity().not_before.timestamp());
        let not_after = to_system_time(parsed.validity().not_after.timestamp());
        let size = certificate.encoded_len();
        drop(parsed);

        let Certificate { chain, private_key } = certificate;
        let signing_key = crypto_provider()
            .key_provider
            .load_private_key(private_key)
            .map_err(|e| CacheError::Verification(e.to_string()))?;
        let certified_key = CertifiedKey::new(chain, signing_key);

        match certified_key.keys_match() {
            Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(CacheError::Verification(e.to_string())),
        }

        Ok(Self {
            hash,
            size,
            certified_key: Arc::new(certified_key),
            names,
            suffixes,
            not_before,
            not_after,
        })
    }

    pub fn hash(&self) -> EntryHash {
        self.hash
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified_key)
    }

    /// Exact names: lower-cased DNS names and bracketed IP literals.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Wildcard suffixes, `*.example.com` stored as `.example.com`.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// First exact name, else `*` plus the first suffix.
    pub fn primary_name(&self) -> String {
        match (self.names.first(), self.suffixes.first()) {
            (Some(name), _) => name.clone(),
            (None, Some(suffix)) => format!("*{suffix}"),
            (None, None) => self.hash.to_string(),
        }
    }

    pub fn event(&self) -> CertificateEvent {
        CertificateEvent {
            name: Arc::from(self.primary_name()),
            certificate: self.certified_key(),
            size: self.size,
            not_after: self.not_after,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("hash", &self.hash)
            .field("size", &self.size)
            .field("names", &self.names)
            .field("suffixes", &self.suffixes)
            .field("not_after", &self.not_after)
            .finish()
    }
}

fn subject_names(cert: &X509Certificate<'_>) -> Result<(Vec<String>, Vec<String>), CacheError> {
    let mut names = Vec::new();
    let mut suffixes = Vec::new();

    let san = cert
        .subject_alternative_name()
        .map_err(|e| CacheError::Verification(format!("malformed subjectAltName: {e}")))?;
    let Some(san) = san else {
        return Ok((names, suffixes));
    };

    for general_name in &san.value.general_names {
        match general_name {
            GeneralName::DNSName(dns) => {
                if let Some(base) = dns.strip_prefix("*.") {
                    if let Some(base) = normalize_dns_name(base) {
                        push_unique(&mut suffixes, format!(".{base}"));
                    }
                } else if let Some(name) = normalize_dns_name(dns) {
                    push_unique(&mut names, name);
                }
            }
            GeneralName::IPAddress(bytes) => {
                if let Some(ip) = ip_from_bytes(bytes) {
                    push_unique(&mut names, ip_literal(ip));
                }
            }
            _ => {}
        }
    }

    Ok((names, suffixes))
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        16 => <[u8; 16]>::try_from(bytes).ok().map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}

fn to_system_time(timestamp: i64) -> SystemTime {
    let offset = Duration::from_secs(timestamp.unsigned_abs());
    let time = if timestamp >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    time.unwrap_or(UNIX_EPOCH)
}
