//! Error types for query translation.

use thiserror::Error;

/// Errors raised while translating generic queries and records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// The generic filter tree does not have a documented node shape.
    ///
    /// Indicates an upstream contract violation; retrying cannot help.
    #[error("Malformed filter: {message}")]
    MalformedFilter { message: String },

    /// A reduction outside of sum/avg/min/max/count was requested.
    #[error("Unsupported reduction `{kind}` (expected one of sum, avg, min, max, count)")]
    UnsupportedReduction { kind: String },

    /// A value could not be coerced and the policy is strict.
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

impl TranslateError {
    /// Create a malformed filter error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedFilter {
            message: message.into(),
        }
    }

    /// Translation errors describe the input, never the environment.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Failure to move a value between the generic and native domains.
///
/// Only surfaces to callers under [`CoercionPolicy::Strict`](crate::CoercionPolicy::Strict);
/// the permissive policy keeps the original value instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    /// Structured text did not parse as JSON.
    #[error("Attribute `{attribute}` holds invalid JSON text: {reason}")]
    InvalidJson { attribute: String, reason: String },

    /// JSON parsed but has no native representation (e.g. bad extended JSON).
    #[error("Attribute `{attribute}` has no native encoding: {reason}")]
    InvalidNative { attribute: String, reason: String },
}

/// Result type for translation operations
pub type TranslateResult<T> = Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message() {
        let err = TranslateError::malformed("`in` needs a list");
        assert_eq!(err.to_string(), "Malformed filter: `in` needs a list");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_coercion_is_transparent() {
        let err: TranslateError = CoercionError::InvalidJson {
            attribute: "settings".to_string(),
            reason: "EOF".to_string(),
        }
        .into();

        assert!(err.to_string().starts_with("Attribute `settings`"));
    }
}
