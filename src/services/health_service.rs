use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness together with the number of rooms held in memory.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let rooms = state.rooms().room_count();
    match state.directory().health_check().await {
        Ok(()) => HealthResponse::ok(rooms),
        Err(err) => {
            warn!(error = %err, "session directory health check failed");
            HealthResponse::degraded(rooms)
        }
    }
}
