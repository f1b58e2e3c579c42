//! Certificate Cache Domain Layer
pub mod certificate;
pub mod config;
pub mod errors;
pub mod hostname;

pub use certificate::Certificate;
pub use config::{CacheConfig, Config, ConfigError, LoggingConfig};
pub use errors::CacheError;
pub use hostname::Hostname;
