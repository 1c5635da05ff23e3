use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid setting in config file {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("Unsupported config format for {path} (expected .toml, .yaml, .yml or .json)")]
    UnsupportedFormat { path: PathBuf },
}

impl ConfigError {
    pub fn parse<E: std::fmt::Display>(path: impl Into<PathBuf>, error: E) -> Self {
        Self::Parse {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
