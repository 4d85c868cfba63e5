/// OpenAPI documentation generation.
pub mod documentation;
/// Command validation and routing for participants.
pub mod gateway;
/// Health check service.
pub mod health_service;
/// Read-only session snapshots.
pub mod session_service;
/// Server-Sent Events streams for observers.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
