//! Certificate Cache Application Layer
//!
//! Ports implemented by the collaborators of the cache (upstream certificate
//! store, trust verification, add/evict callbacks) and the request context that
//! carries cancellation through every public operation.
pub mod context;
pub mod ports;

pub use context::RequestContext;
