pub mod cache;
pub mod entry;
pub mod notifier;
pub mod resolver;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheMetricsSnapshot, CertCache, CertCacheBuilder};
pub use entry::{Entry, EntryHash};
pub use notifier::Notifier;
pub use resolver::{AcceptError, SniAcceptor, SniResolver};
pub use verifier::WebPkiVerifier;

use rustls::crypto::CryptoProvider;
use std::any::Any;
use std::sync::Arc;

/// Process default provider, or aws-lc-rs when none was installed.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
