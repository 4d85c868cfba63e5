use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::common::SessionStatusResponse, error::AppError, services::session_service,
    state::SharedState,
};

/// Read-only session endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/sessions/{id}", get(get_session))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Current snapshot and participants", body = SessionStatusResponse),
        (status = 404, description = "Unknown session"),
        (status = 503, description = "Session directory unreachable")
    )
)]
/// Return the current timer snapshot and participants of a session.
pub async fn get_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let payload = session_service::get_status(&state, &session_id).await?;
    Ok(Json(payload))
}
