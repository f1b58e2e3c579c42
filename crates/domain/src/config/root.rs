use super::{CacheConfig, ConfigError, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
///
/// ```toml
/// [cache]
/// max_size = 33554432
/// max_workers = 4
/// prune_interval_secs = 300
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, or the defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(Path::new(path)).map_err(|source| {
            ConfigError::Read {
                path: path.to_string(),
                source,
            }
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        if self.cache.max_size != 0 && self.cache.max_size < super::MIN_CACHE_SIZE {
            return Err(ConfigError::Validation(format!(
                "cache.max_size must be at least {} bytes",
                super::MIN_CACHE_SIZE
            )));
        }

        Ok(())
    }
}
