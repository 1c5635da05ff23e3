//! Store and adapter error types

use moorage_query::TranslateError;
use thiserror::Error;

/// Error reported by a store executor, relayed by the adapter as is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// The backend failed while running an otherwise valid request
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The store refused the request itself (bad filter, unknown stage,
    /// duplicate key)
    #[error("Store rejected request: {0}")]
    Rejected(String),
}

impl ExecutorError {
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend(message.into())
    }

    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self::Rejected(message.into())
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Error returned by [`Adapter`](crate::Adapter) methods
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("No `{model}` model has been registered with this adapter")]
    UnknownModel { model: String },

    #[error("`{method}` query is missing `{field}`")]
    MissingAttribute {
        method: &'static str,
        field: &'static str,
    },

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl AdapterError {
    pub fn unknown_model<S: Into<String>>(model: S) -> Self {
        Self::UnknownModel {
            model: model.into(),
        }
    }

    /// Whether resubmitting the same query could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Executor(ExecutorError::Backend(_)))
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
