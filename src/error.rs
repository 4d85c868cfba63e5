use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::DirectoryError, dto::ws::ErrorCode, state::timer::InvalidTransition};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The session directory could not be reached.
    #[error("session directory unavailable")]
    Unavailable(#[source] DirectoryError),
    /// Malformed or out-of-range command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    /// The session is neither live nor known to the directory.
    #[error("unknown session `{0}`")]
    UnknownSession(String),
    /// The timer cannot take the command in its current phase.
    #[error(transparent)]
    RejectedTransition(#[from] InvalidTransition),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Code reported to WebSocket clients in a negative ack.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Unavailable(_) => ErrorCode::Unavailable,
            ServiceError::RejectedTransition(_) => ErrorCode::RejectedTransition,
            ServiceError::InvalidCommand(_)
            | ServiceError::UnknownSession(_)
            | ServiceError::NotFound(_) => ErrorCode::InvalidCommand,
        }
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::UnknownSession(session_id) => ServiceError::UnknownSession(session_id),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidCommand(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::InvalidCommand(message) => AppError::BadRequest(message),
            ServiceError::UnknownSession(session_id) => {
                AppError::NotFound(format!("session `{session_id}` not found"))
            }
            ServiceError::RejectedTransition(invalid) => AppError::Conflict(invalid.to_string()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
