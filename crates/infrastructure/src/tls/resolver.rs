use super::cache::CertCache;
use super::crypto_provider;
use certcache_application::ports::CertificateRequest;
use certcache_application::RequestContext;
use certcache_domain::CacheError;
use rustls::crypto::CryptoProvider;
use rustls::server::{Acceptor, ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tokio_rustls::LazyConfigAcceptor;
use tracing::debug;

/// Synchronous rustls hook answering from the cache only.
///
/// A miss fails the handshake; use [`SniAcceptor`] to fetch on demand.
#[derive(Debug, Clone)]
pub struct SniResolver {
    cache: CertCache,
}

impl SniResolver {
    pub fn new(cache: CertCache) -> Self {
        Self { cache }
    }
}

impl ResolvesServerCert for SniResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let name = client_hello.server_name()?;
        self.cache.peek(name)
    }
}

#[derive(Error, Debug)]
pub enum AcceptError {
    #[error("I/O error during handshake: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Certificate(#[from] CacheError),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

/// Accepts TLS connections, resolving the certificate from the ClientHello
/// through the cache before the handshake continues.
#[derive(Debug, Clone)]
pub struct SniAcceptor {
    cache: CertCache,
    provider: Arc<CryptoProvider>,
    alpn_protocols: Vec<Vec<u8>>,
}

impl SniAcceptor {
    pub fn new(cache: CertCache) -> Self {
        Self {
            cache,
            provider: crypto_provider(),
            alpn_protocols: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_alpn_protocols(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.alpn_protocols = protocols;
        self
    }

    pub async fn accept<IO>(
        &self,
        stream: IO,
        ctx: &RequestContext,
    ) -> Result<TlsStream<IO>, AcceptError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        self.handshake(stream, None, ctx).await
    }

    /// Like [`accept`](Self::accept), falling back to `local_addr` for
    /// clients that send no SNI.
    pub async fn accept_from<IO>(
        &self,
        stream: IO,
        local_addr: SocketAddr,
        ctx: &RequestContext,
    ) -> Result<TlsStream<IO>, AcceptError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        self.handshake(stream, Some(local_addr), ctx).await
    }

    async fn handshake<IO>(
        &self,
        stream: IO,
        local_addr: Option<SocketAddr>,
        ctx: &RequestContext,
    ) -> Result<TlsStream<IO>, AcceptError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let start = tokio::select! {
            start = LazyConfigAcceptor::new(Acceptor::default(), stream) => start?,
            err = ctx.done() => return Err(err.into()),
        };

        let mut request = CertificateRequest::from(&start.client_hello());
        request.local_addr = local_addr;

        let certified_key = self.cache.get_certificate(&request, ctx).await?;
        let config = self.server_config(certified_key)?;

        debug!(server_name = ?request.server_name, "Completing TLS handshake");
        tokio::select! {
            stream = start.into_stream(config) => Ok(stream?),
            err = ctx.done() => Err(err.into()),
        }
    }

    fn server_config(&self, certified_key: Arc<CertifiedKey>) -> Result<Arc<ServerConfig>, AcceptError> {
        let mut config = ServerConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_cert_resolver(Arc::new(FixedCertificate(certified_key)));
        config.alpn_protocols = self.alpn_protocols.clone();
        Ok(Arc::new(config))
    }
}

/// Serves one already resolved certificate for a single handshake.
#[derive(Debug)]
struct FixedCertificate(Arc<CertifiedKey>);

impl ResolvesServerCert for FixedCertificate {
    fn resolve(&self, _: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }
}
