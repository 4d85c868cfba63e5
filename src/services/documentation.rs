use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for drill-sync.
#[openapi(
    info(
        title = "drill-sync",
        description = "Synchronized countdown timers for shared training sessions"
    ),
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::get_session,
        crate::routes::sse::session_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::SessionStatusResponse,
            crate::dto::common::RoomSnapshot,
            crate::dto::common::TimerStateDto,
            crate::dto::common::ParticipantSummary,
            crate::dto::phase::VisibleTimerPhase,
            crate::dto::ws::ClientEnvelope,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::CommandAck,
            crate::dto::ws::AckError,
            crate::dto::ws::ErrorCode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session snapshots for observers"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "participants", description = "WebSocket operations for session participants"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/sessions/{id}", "/sse/sessions/{id}", "/ws"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
