use crate::{
    dto::{common::SessionStatusResponse, validation::validate_identifier},
    error::ServiceError,
    state::SharedState,
};

/// Current snapshot and participants of a session.
pub async fn get_status(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionStatusResponse, ServiceError> {
    validate_identifier(session_id)
        .map_err(|err| ServiceError::InvalidCommand(format!("invalid session id: {err}")))?;
    state.rooms().status(session_id).await
}
