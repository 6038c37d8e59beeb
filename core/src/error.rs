//! Error types for the registry client.
//!
//! # Design
//! `ApiError` is `Clone` because a single refresh outcome is handed to every
//! request queued behind it. Payloads are therefore strings rather than the
//! underlying library errors.

use thiserror::Error;

/// Errors returned by the request codec, the transports and the services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 404: the requested record does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server rejected the credentials even after a refresh attempt.
    #[error("authorization denied")]
    Unauthorized,

    /// No usable refresh token, or the refresh call failed. The session has
    /// been cleared and the user must log in again.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The task performing the refresh was dropped before it settled.
    #[error("token refresh was abandoned")]
    RefreshAborted,

    /// The server returned a non-2xx status other than 401 and 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// Session storage could not be read or written.
    #[error("session storage failed: {0}")]
    Session(String),
}

impl ApiError {
    /// Whether the error means the user has to authenticate again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::SessionExpired(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Errors from persisting the token pair.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err.to_string())
    }
}
