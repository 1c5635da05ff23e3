//! Translation options
//!
//! Knobs that change how generic values land in the store. Loaded by
//! `moorage-config`, but plain data here so the engine stays I/O free.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do when a value cannot be coerced into its native form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// Keep the original value and log a warning. Writes never fail on
    /// malformed encoded data.
    #[default]
    Permissive,
    /// Surface the coercion error to the caller.
    Strict,
}

impl CoercionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoercionPolicy::Permissive => "permissive",
            CoercionPolicy::Strict => "strict",
        }
    }
}

impl FromStr for CoercionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(CoercionPolicy::Permissive),
            "strict" => Ok(CoercionPolicy::Strict),
            other => Err(format!(
                "unknown coercion policy `{}` (expected permissive or strict)",
                other
            )),
        }
    }
}

/// Options shared by the filter and document normalizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Primary key field inside stored documents
    pub native_key: String,
    pub coercion: CoercionPolicy,
    /// Render `like` comparisons as case-insensitive regexes
    pub like_case_insensitive: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            native_key: "_id".to_string(),
            coercion: CoercionPolicy::Permissive,
            like_case_insensitive: true,
        }
    }
}

impl TranslateOptions {
    /// Builder-style: set the coercion policy
    #[must_use]
    pub fn with_coercion(mut self, policy: CoercionPolicy) -> Self {
        self.coercion = policy;
        self
    }

    /// Builder-style: set the native primary key field
    #[must_use]
    pub fn with_native_key(mut self, key: impl Into<String>) -> Self {
        self.native_key = key.into();
        self
    }
}
