//! # Moorage configuration
//!
//! Loads [`MoorageConfig`] from a TOML, YAML or JSON file (picked by
//! extension) and layers `MOORAGE_*` environment overrides on top.
//!
//! ```rust,no_run
//! use moorage_config::MoorageConfig;
//! use std::path::Path;
//!
//! let config = MoorageConfig::load(Some(Path::new("moorage.toml")))?;
//! println!("native key: {}", config.translate.native_key);
//! # Ok::<(), moorage_config::ConfigError>(())
//! ```

mod config;
mod error;

pub use config::*;
pub use error::{ConfigError, ConfigResult};
