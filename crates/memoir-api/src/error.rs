//! Error types for the backend client

use memoir_core::MemoirError;
use thiserror::Error;

/// Result type alias for backend calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Backend client errors
///
/// `Clone` so that one token refresh outcome can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Account locked: {0}")]
    AccountLocked(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Not logged in")]
    NoToken,

    #[error("Token storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub(crate) fn network(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }

    pub(crate) fn decode(e: impl std::fmt::Display) -> Self {
        ApiError::Decode(e.to_string())
    }

    pub(crate) fn storage(e: MemoirError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<ApiError> for MemoirError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::NoToken => MemoirError::NotAuthenticated,
            ApiError::Storage(msg) => MemoirError::StorageError(msg),
            other => MemoirError::NetworkError(other.to_string()),
        }
    }
}
