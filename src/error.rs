//! # Error types
//!
//! Every fallible operation in the library returns a [`TriageError`]. The kinds
//! mirror how each failure is handled upstream:
//!
//! | Variant | Raised by | Recovery |
//! |---------|-----------|----------|
//! | [`EmptyInput`](TriageError::EmptyInput) | conversation pipeline | surfaced to the user (HTTP 400) |
//! | [`Fetch`](TriageError::Fetch) | reference fetcher | the symptom is skipped |
//! | [`NoMatchFound`](TriageError::NoMatchFound) | offline report flow | flow ends gracefully |
//! | [`RemoteService`](TriageError::RemoteService) | embedding / generation calls | aborts the turn (HTTP 500) |
//! | [`Cache`](TriageError::Cache) | embedding cache persistence | aborts the caller |
//!
//! Resetting an unknown session is deliberately **not** an error.

use async_openai::error::OpenAIError;

/// Convenience alias used across the crate.
pub type TriageResult<T> = Result<T, TriageError>;

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Empty message")]
    EmptyInput,

    #[error("failed to fetch reference text for '{symptom}': {reason}")]
    Fetch { symptom: String, reason: String },

    #[error("No valid symptoms recognized")]
    NoMatchFound,

    #[error("remote service failure: {0}")]
    RemoteService(String),

    #[error("embedding cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl From<OpenAIError> for TriageError {
    fn from(err: OpenAIError) -> Self {
        TriageError::RemoteService(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for TriageError {
    fn from(err: bincode::error::EncodeError) -> Self {
        TriageError::Cache(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for TriageError {
    fn from(err: bincode::error::DecodeError) -> Self {
        TriageError::Cache(err.to_string())
    }
}
