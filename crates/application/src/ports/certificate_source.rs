use async_trait::async_trait;
use certcache_domain::{CacheError, Certificate, Hostname};
use rustls::server::ClientHello;
use rustls::RootCertStore;
use std::net::SocketAddr;
use std::sync::Arc;

/// What a TLS handshake tells us about the certificate it wants.
#[derive(Debug, Clone, Default)]
pub struct CertificateRequest {
    /// SNI hostname, if the client sent one.
    pub server_name: Option<String>,
    /// Address the connection was accepted on.
    pub local_addr: Option<SocketAddr>,
}

impl CertificateRequest {
    pub fn for_name(server_name: impl Into<String>) -> Self {
        Self {
            server_name: Some(server_name.into()),
            local_addr: None,
        }
    }

    pub fn with_local_addr(mut self, local_addr: SocketAddr) -> Self {
        self.local_addr = Some(local_addr);
        self
    }

    /// Name to look up: the SNI value, or the local IP when SNI is absent.
    pub fn hostname(&self) -> Result<Hostname, CacheError> {
        match (self.server_name.as_deref(), self.local_addr) {
            (Some(name), _) if !name.is_empty() => Hostname::parse(name),
            (_, Some(addr)) => Ok(Hostname::from_ip(addr.ip())),
            _ => Err(CacheError::InvalidName(String::new())),
        }
    }
}

impl From<&ClientHello<'_>> for CertificateRequest {
    fn from(hello: &ClientHello<'_>) -> Self {
        Self {
            server_name: hello.server_name().map(str::to_owned),
            local_addr: None,
        }
    }
}

/// Upstream certificate store sitting behind the cache.
///
/// The cache never calls `get_certificate` concurrently for the same name.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn get_certificate(&self, name: &Hostname) -> Result<Certificate, CacheError>;

    /// Roots new entries are verified against. `None` skips chain verification.
    fn trust_roots(&self) -> Option<Arc<RootCertStore>> {
        None
    }
}
