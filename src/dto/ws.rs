use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        common::{RoomSnapshot, TimerStateDto},
        validation::validate_identifier,
    },
    error::ServiceError,
    state::timer::TimerState,
};

/// Payload of a `join` command.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct JoinCommand {
    #[validate(custom(function = "validate_identifier"))]
    pub session_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
}

/// Payload of commands that only name their session (`leave`, `pause`, `resume`, `stop`).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct SessionRef {
    #[validate(custom(function = "validate_identifier"))]
    pub session_id: String,
}

/// Payload of a `start` command.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct StartCommand {
    #[validate(custom(function = "validate_identifier"))]
    pub session_id: String,
    /// Round length in whole seconds.
    #[validate(range(min = 1))]
    pub duration: u32,
    pub drill_index: usize,
}

/// Payload of a `set_drill` command.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct SetDrillCommand {
    #[validate(custom(function = "validate_identifier"))]
    pub session_id: String,
    pub drill_index: usize,
}

/// Payload of a `drill_completed` relay.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct DrillCompletedCommand {
    #[validate(custom(function = "validate_identifier"))]
    pub session_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub drill_id: String,
    pub completed: bool,
}

/// Payload of a `note` relay.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct NoteCommand {
    #[validate(custom(function = "validate_identifier"))]
    pub session_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub drill_id: String,
    pub text: String,
}

/// Commands accepted from participant WebSocket clients.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join(JoinCommand),
    Leave(SessionRef),
    Start(StartCommand),
    Pause(SessionRef),
    Resume(SessionRef),
    Stop(SessionRef),
    SetDrill(SetDrillCommand),
    DrillCompleted(DrillCompletedCommand),
    Note(NoteCommand),
}

impl ClientMessage {
    /// Wire name of the command, echoed in acknowledgements.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Leave(_) => "leave",
            Self::Start(_) => "start",
            Self::Pause(_) => "pause",
            Self::Resume(_) => "resume",
            Self::Stop(_) => "stop",
            Self::SetDrill(_) => "set_drill",
            Self::DrillCompleted(_) => "drill_completed",
            Self::Note(_) => "note",
        }
    }

    /// Session the command targets.
    pub fn session_id(&self) -> &str {
        match self {
            Self::Join(JoinCommand { session_id, .. })
            | Self::Leave(SessionRef { session_id })
            | Self::Start(StartCommand { session_id, .. })
            | Self::Pause(SessionRef { session_id })
            | Self::Resume(SessionRef { session_id })
            | Self::Stop(SessionRef { session_id })
            | Self::SetDrill(SetDrillCommand { session_id, .. })
            | Self::DrillCompleted(DrillCompletedCommand { session_id, .. })
            | Self::Note(NoteCommand { session_id, .. }) => session_id,
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Join(command) => command.validate(),
            Self::Leave(command)
            | Self::Pause(command)
            | Self::Resume(command)
            | Self::Stop(command) => command.validate(),
            Self::Start(command) => command.validate(),
            Self::SetDrill(command) => command.validate(),
            Self::DrillCompleted(command) => command.validate(),
            Self::Note(command) => command.validate(),
        }
    }
}

/// Inbound frame: a command plus an optional correlation id echoed in its ack.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ClientEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub message: ClientMessage,
}

impl ClientEnvelope {
    /// Parse and validate a text frame.
    pub fn from_json_str(payload: &str) -> Result<Self, ServiceError> {
        let envelope: Self = serde_json::from_str(payload)
            .map_err(|err| ServiceError::InvalidCommand(format!("malformed payload: {err}")))?;
        envelope.message.validate()?;
        Ok(envelope)
    }
}

/// Machine-readable reason attached to a rejected command.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed payload, out-of-range value or unknown session.
    InvalidCommand,
    /// The timer cannot take this command in its current phase.
    RejectedTransition,
    /// A collaborator needed to resolve the command is unreachable.
    Unavailable,
}

/// Error details of a rejected command.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct AckError {
    pub code: ErrorCode,
    pub message: String,
}

/// Accept/reject acknowledgement sent to the issuing connection only.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct CommandAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub command: String,
    pub accepted: bool,
    /// Room sequence number reached by an accepted timer command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AckError>,
}

impl CommandAck {
    /// Positive acknowledgement.
    pub fn accepted(request_id: Option<String>, command: &str, seq: Option<u64>) -> Self {
        Self {
            request_id,
            command: command.to_string(),
            accepted: true,
            seq,
            error: None,
        }
    }

    /// Negative acknowledgement describing `err`.
    pub fn rejected(request_id: Option<String>, command: &str, err: &ServiceError) -> Self {
        Self {
            request_id,
            command: command.to_string(),
            accepted: false,
            seq: None,
            error: Some(AckError {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }
}

/// Messages pushed to participants and observers.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state, sent to a joiner only.
    Snapshot(RoomSnapshot),
    /// Someone joined; sent to everyone already in the room.
    Joined { participant_count: usize },
    /// Someone left or timed out.
    Left { participant_count: usize },
    /// New canonical timer state.
    State(TimerStateDto),
    /// Hard reset: viewers clear their display without reconciling.
    Stopped { seq: u64, drill_index: usize },
    /// Opaque completion relay.
    CompletionUpdate { drill_id: String, completed: bool },
    /// Opaque note relay.
    NoteUpdate { drill_id: String, text: String },
    /// Outcome of the issuer's own command.
    Ack(CommandAck),
}

impl ServerMessage {
    /// Event name used on SSE streams.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Joined { .. } => "joined",
            Self::Left { .. } => "left",
            Self::State(_) => "state",
            Self::Stopped { .. } => "stopped",
            Self::CompletionUpdate { .. } => "completion_update",
            Self::NoteUpdate { .. } => "note_update",
            Self::Ack(_) => "ack",
        }
    }

    /// Broadcast produced by an accepted timer transition.
    ///
    /// A stop is announced with its own event so viewers reset unconditionally.
    pub fn for_transition(stopped: bool, state: &TimerState) -> Self {
        if stopped {
            Self::Stopped {
                seq: state.seq,
                drill_index: state.drill_index,
            }
        } else {
            Self::State(state.into())
        }
    }
}
