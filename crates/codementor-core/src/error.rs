use std::time::Duration;
use thiserror::Error;

use crate::state::ErrorKind;

/// Why a single generate request failed
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("API returned an unexpected response format")]
    UnexpectedFormat,

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("a request is already in flight")]
    AlreadyInFlight,

    #[error("{0}")]
    Other(String),
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Api { .. } => ErrorKind::ApiError,
            RequestError::UnexpectedFormat => ErrorKind::UnexpectedFormat,
            RequestError::Timeout(_) => ErrorKind::Timeout,
            RequestError::Network(_) => ErrorKind::NetworkError,
            RequestError::AlreadyInFlight | RequestError::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Classify a transport error raised while sending or reading the body.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RequestError::Timeout(timeout)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            RequestError::Network(err)
        } else {
            RequestError::Other(err.to_string())
        }
    }
}

/// Rejections raised before a send reaches the request lifecycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message is empty")]
    Empty,

    #[error("a request is already in flight")]
    Busy,
}
