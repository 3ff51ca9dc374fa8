//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::CheckConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HUSHCHECK_CONFIG";

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    /// A file the user named; it must exist.
    Explicit(PathBuf),
    /// Well-known locations, first existing file wins; none means defaults.
    Search(Vec<PathBuf>),
}

/// Loads `CheckConfig` from an explicit file or the usual locations.
#[derive(Debug)]
pub struct ConfigLoader {
    source: ConfigSource,
}

impl ConfigLoader {
    /// Search `./.hushcheck.toml`, then `<config_dir>/hushcheck/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let mut paths = vec![PathBuf::from(".hushcheck.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("hushcheck").join("config.toml"));
        }
        Self {
            source: ConfigSource::Search(paths),
        }
    }

    /// Use the file named by `HUSHCHECK_CONFIG`, else search the usual locations.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::with_path(PathBuf::from(path)),
            _ => Self::new(),
        }
    }

    /// Load exactly this file; a missing file is an error.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            source: ConfigSource::Explicit(path),
        }
    }

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if an explicit file is missing or
    /// unreadable, and `ConfigError::ParseError` if a file is not valid.
    pub fn load(&self) -> Result<CheckConfig, ConfigError> {
        match &self.source {
            ConfigSource::Explicit(path) => Self::load_from_path(path),
            ConfigSource::Search(paths) => match paths.iter().find(|path| path.is_file()) {
                Some(path) => Self::load_from_path(path),
                None => {
                    tracing::debug!("No config file found, using defaults");
                    Ok(CheckConfig::default())
                }
            },
        }
    }

    fn load_from_path(path: &Path) -> Result<CheckConfig, ConfigError> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
