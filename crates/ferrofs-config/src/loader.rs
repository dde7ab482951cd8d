//! Configuration loader utilities

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Default prefix of environment variable overrides
pub const DEFAULT_ENV_PREFIX: &str = "FERROFS";

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the first file found in the default locations,
    /// overridden by `FERROFS__*` environment variables
    pub fn load() -> ConfigResult<Config> {
        Self::load_with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Configuration file not found",
                ),
            });
        }

        ConfigBuilder::new()
            .add_defaults()
            .add_source_file(path)
            .add_env_prefix(DEFAULT_ENV_PREFIX)
            .build()
    }

    /// Load configuration with custom environment prefix
    pub fn load_with_env_prefix<S: Into<String>>(prefix: S) -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();
        if let Some(path) = Self::config_exists() {
            builder = builder.add_source_file(path);
        }
        builder.add_env_prefix(prefix).build()
    }

    /// Save configuration to a file, picking the format from its extension
    pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(config)?,
            Some("json") => serde_json::to_string_pretty(config)?,
            _ => serde_yaml::to_string(config)?,
        };

        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default configuration file paths in order of preference
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = ["ferrofs.yaml", "ferrofs.yml", "ferrofs.toml", "ferrofs.json"]
            .iter()
            .map(PathBuf::from)
            .collect();

        #[cfg(unix)]
        paths.extend(
            ["config.yaml", "config.yml", "config.toml"]
                .iter()
                .map(|name| Path::new("/etc/ferrofs").join(name)),
        );

        paths
    }

    /// Check if a configuration file exists in default locations
    pub fn config_exists() -> Option<PathBuf> {
        Self::default_config_paths()
            .into_iter()
            .find(|path| path.exists())
    }
}
