//! Certificate Cache Infrastructure Layer
//!
//! The in-process TLS certificate cache: content-addressed entries, exact and
//! wildcard indexes with LRU eviction, single-flight upstream fetches, the
//! asynchronous notifier and the rustls integration.
pub mod logging;
pub mod tls;

pub use logging::init_logging;
pub use tls::{CertCache, CertCacheBuilder, SniAcceptor, SniResolver, WebPkiVerifier};
