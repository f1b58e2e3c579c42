use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;

/// A certificate chain together with the private key of its leaf.
///
/// `chain[0]` is the leaf, followed by any intermediates.
pub struct Certificate {
    pub chain: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
}

impl Certificate {
    pub fn new(chain: Vec<CertificateDer<'static>>, private_key: PrivateKeyDer<'static>) -> Self {
        Self { chain, private_key }
    }

    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.chain.first()
    }

    pub fn intermediates(&self) -> &[CertificateDer<'static>] {
        self.chain.get(1..).unwrap_or_default()
    }

    /// Encoded size of the chain plus the private key, in bytes.
    pub fn encoded_len(&self) -> usize {
        let chain: usize = self.chain.iter().map(|der| der.len()).sum();
        chain + self.private_key.secret_der().len()
    }
}

impl Clone for Certificate {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            private_key: self.private_key.clone_key(),
        }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("chain_len", &self.chain.len())
            .field("encoded_len", &self.encoded_len())
            .finish()
    }
}
