pub mod cache_events;
pub mod certificate_source;
pub mod certificate_verifier;

pub use cache_events::{CacheEventHandler, CertificateEvent, NoopEventHandler};
pub use certificate_source::{CertificateRequest, CertificateSource};
pub use certificate_verifier::CertificateVerifier;
