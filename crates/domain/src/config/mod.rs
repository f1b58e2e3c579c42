//! Configuration module for the certificate cache
//!
//! - `root`: Top-level configuration and file loading
//! - `cache`: Cache budget, worker pool and maintenance settings
//! - `logging`: Logging settings
//! - `errors`: Configuration errors

pub mod cache;
pub mod errors;
pub mod logging;
pub mod root;

pub use cache::{CacheConfig, MIN_CACHE_SIZE, MIN_WORKERS};
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::Config;
