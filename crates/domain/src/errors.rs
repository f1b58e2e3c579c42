use thiserror::Error;

/// Errors surfaced by the certificate cache and its collaborators.
///
/// `Clone` because one single-flight outcome is delivered to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid server name: {0}")]
    InvalidName(String),

    #[error("Certificate has no leaf")]
    EmptyCertificate,

    /// Message of the verifier, passed through verbatim.
    #[error("{0}")]
    Verification(String),

    #[error("No certificate found for {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Panic recovered: {0}")]
    Panicked(String),

    #[error("Certificate cache is closed")]
    Closed,
}

impl CacheError {
    /// True for the caller's own cancellation or deadline errors.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
