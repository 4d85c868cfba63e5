//! Error types of the HTTP session directory.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::DirectoryError;

/// Convenient result alias returning [`HttpDirectoryError`] failures.
pub type HttpResult<T> = Result<T, HttpDirectoryError>;

/// Failures that can occur while talking to the session-content service.
#[derive(Debug, Error)]
pub enum HttpDirectoryError {
    /// The configured base URL cannot be used to build request URLs.
    #[error("invalid content service base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build content service client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send content service request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with an unexpected status code.
    #[error("unexpected content service response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The response body could not be decoded.
    #[error("failed to decode content service response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl From<HttpDirectoryError> for DirectoryError {
    fn from(err: HttpDirectoryError) -> Self {
        DirectoryError::unavailable(err.to_string(), err)
    }
}
