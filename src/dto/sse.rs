use serde::Serialize;

use crate::dto::ws::ServerMessage;

#[derive(Clone, Debug)]
/// Room event serialized once and fanned out to every subscriber.
pub struct RoomEvent {
    /// SSE event name; WebSocket clients read the `type` tag inside `data` instead.
    pub event: &'static str,
    /// JSON body.
    pub data: String,
}

impl RoomEvent {
    /// Serialize `message` for broadcast.
    pub fn from_message(message: &ServerMessage) -> serde_json::Result<Self> {
        Self::json(message.event_name(), message)
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &'static str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?,
        })
    }

    /// Decode the payload back into a [`ServerMessage`].
    pub fn message(&self) -> serde_json::Result<ServerMessage> {
        serde_json::from_str(&self.data)
    }
}
