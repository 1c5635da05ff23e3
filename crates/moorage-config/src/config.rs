//! Configuration structures and their loader.
//!
//! Precedence: defaults < config file < environment.

use crate::error::{ConfigError, ConfigResult};
use moorage_query::{CoercionPolicy, TranslateOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable overriding `translate.coercion`
pub const ENV_COERCION_POLICY: &str = "MOORAGE_COERCION_POLICY";
/// Environment variable overriding `translate.native_key`
pub const ENV_NATIVE_KEY: &str = "MOORAGE_NATIVE_KEY";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "MOORAGE_LOG_LEVEL";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoorageConfig {
    /// Filter and document translation settings
    pub translate: TranslateOptions,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name (`off`, `error`, `warn`, `info`, `debug`, `trace`).
    /// Unset leaves the choice to the binary.
    pub level: Option<String>,
}

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

impl MoorageConfig {
    /// Load configuration: defaults, then `config_file` if given, then the
    /// `MOORAGE_*` environment variables.
    pub fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Read a config file, picking the parser from its extension
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_str_with_format(&content, format, path)?;
        debug!(path = %path.display(), ?format, "loaded config file");
        Ok(config)
    }

    /// Parse config text in `format`. `origin` only labels errors.
    pub fn from_str_with_format(
        content: &str,
        format: ConfigFormat,
        origin: &Path,
    ) -> ConfigResult<Self> {
        let config: Self = match format {
            #[cfg(feature = "toml")]
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::parse(origin, e))?,
            #[cfg(feature = "yaml")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::parse(origin, e))?
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::parse(origin, e))?
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: origin.to_path_buf(),
                })
            }
        };

        config.validate(origin)?;
        Ok(config)
    }

    /// Reject settings that parse but cannot be used
    fn validate(&self, origin: &Path) -> ConfigResult<()> {
        if self.translate.native_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                path: origin.to_path_buf(),
                message: "`translate.native_key` must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|var| std::env::var(var).ok());
    }

    /// Apply overrides from `lookup`.
    ///
    /// Values that do not parse are ignored with a warning, keeping the
    /// setting from the file or the default.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_COERCION_POLICY) {
            match value.parse::<CoercionPolicy>() {
                Ok(policy) => self.translate.coercion = policy,
                Err(reason) => warn!(var = ENV_COERCION_POLICY, %reason, "ignoring override"),
            }
        }

        if let Some(key) = lookup(ENV_NATIVE_KEY) {
            if key.trim().is_empty() {
                warn!(var = ENV_NATIVE_KEY, "ignoring empty override");
            } else {
                self.translate.native_key = key.trim().to_string();
            }
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = Some(level.trim().to_ascii_lowercase());
        }
    }
}
