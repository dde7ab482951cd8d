//! Configuration loading for the FerroFS stream engine
//!
//! Stream engine settings are fixed once an engine exists, so they are typically
//! loaded a single time at startup and handed to
//! `ferrofs_io::StreamEngine::install_global`.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: ring and pool settings are checked before an engine sees them
//! - **Environment overrides**: `FERROFS__ENGINE__FIFO_DEPTH=8` and friends
//! - **Defaults**: every setting has a sensible default
//!
//! # Examples
//!
//! ```rust
//! use ferrofs_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ferrofs.yaml")
//!     .add_env_prefix("FERROFS")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("FIFO depth: {}", config.engine.fifo_depth.get());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrofs_types::EngineConfig;
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for FerroFS
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Stream copy engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        self.logging.validate()
    }
}

/// Logging configuration for applications embedding the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, such as `info` or `ferrofs_io=debug`
    pub level: String,
    /// Emit JSON formatted events
    pub json_format: bool,
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    fn validate(&self) -> ConfigResult<()> {
        // a bare level is checked, full directives are left to the subscriber
        if !self.level.contains(['=', ','])
            && !Self::LEVELS.contains(&self.level.to_ascii_lowercase().as_str())
        {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[rstest]
    #[case("info", true)]
    #[case("WARN", true)]
    #[case("ferrofs_io=trace,info", true)]
    #[case("verbose", false)]
    fn test_logging_level_validation(#[case] level: &str, #[case] valid: bool) {
        let logging = LoggingConfig {
            level: level.to_string(),
            json_format: false,
        };
        assert_eq!(logging.validate().is_ok(), valid);
    }
}
