#![forbid(unsafe_code)]

use gq_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{reason}")]
    Validation { reason: String, key: Option<String> },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl QueueError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            key: None,
        }
    }

    pub(crate) fn invalid_key(reason: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            key: Some(key.into()),
        }
    }

    /// Stable kind for CLI output and callers that branch on the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store",
        }
    }
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownId => Self::NotFound("unknown id".to_string()),
            StoreError::InvalidInput(reason) => Self::validation(reason),
            StoreError::StateMismatch { .. }
            | StoreError::AlreadyRetried { .. }
            | StoreError::BatchStateMismatch { .. } => Self::Conflict(err.to_string()),
            other => Self::Store(other),
        }
    }
}
