//! Validation and routing of participant commands.
//!
//! Transport-agnostic: the WebSocket adapter feeds parsed [`ClientMessage`]s in and
//! turns the outcome into an acknowledgement for the issuer.

use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::ws::{
        ClientMessage, CommandAck, DrillCompletedCommand, JoinCommand, NoteCommand, SessionRef,
        SetDrillCommand, StartCommand, ServerMessage,
    },
    error::ServiceError,
    state::{SharedState, Subscription, presence::ConnectionId, timer::{TimerCommand, TimerState}},
};

/// Per-connection bookkeeping: who the connection is and which session it joined.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    connection_id: ConnectionId,
    joined: Option<String>,
}

impl SessionHandle {
    /// Handle for a fresh connection with a random id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Handle for a known connection id.
    pub fn with_id(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            joined: None,
        }
    }

    /// Identifier the connection is tracked under in presence.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Session the connection currently participates in.
    pub fn joined_session(&self) -> Option<&str> {
        self.joined.as_deref()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// What an accepted command produced for its issuer.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The connection is now part of the room; forward its feed.
    Joined(Subscription),
    /// The connection left its room; stop forwarding.
    Left { participant_count: usize },
    /// New canonical timer state, already broadcast to the room.
    Timer(TimerState),
    /// Relay broadcast to the room.
    Relayed,
}

impl CommandOutcome {
    fn seq(&self) -> Option<u64> {
        match self {
            CommandOutcome::Timer(state) => Some(state.seq),
            _ => None,
        }
    }
}

/// Validate `message` and route it to the room registry.
pub async fn dispatch(
    state: &SharedState,
    handle: &mut SessionHandle,
    message: ClientMessage,
) -> Result<CommandOutcome, ServiceError> {
    message.validate()?;
    ensure_session_scope(handle, &message)?;

    let rooms = state.rooms();
    let connection_id = handle.connection_id;

    match message {
        ClientMessage::Join(JoinCommand {
            session_id,
            user_id,
        }) => {
            let subscription = rooms.join(&session_id, connection_id, &user_id).await?;
            if let Some(previous) = handle.joined.replace(session_id.clone()) {
                if previous != session_id {
                    debug!(%connection_id, from = %previous, to = %session_id, "switching session");
                    if let Err(err) = rooms.leave(&previous, connection_id).await {
                        warn!(%connection_id, session_id = %previous, error = %err, "failed to leave previous session");
                    }
                }
            }
            Ok(CommandOutcome::Joined(subscription))
        }
        ClientMessage::Leave(SessionRef { session_id }) => {
            let participant_count = rooms.leave(&session_id, connection_id).await?;
            handle.joined = None;
            Ok(CommandOutcome::Left { participant_count })
        }
        ClientMessage::Start(StartCommand {
            session_id,
            duration,
            drill_index,
        }) => {
            let max = state.config().max_duration_seconds();
            if duration > max {
                return Err(ServiceError::InvalidCommand(format!(
                    "duration must be between 1 and {max} seconds (got {duration})"
                )));
            }
            let command = TimerCommand::Start {
                duration_ms: u64::from(duration) * 1_000,
                drill_index,
            };
            timer(state, &session_id, command).await
        }
        ClientMessage::Pause(SessionRef { session_id }) => {
            timer(state, &session_id, TimerCommand::Pause).await
        }
        ClientMessage::Resume(SessionRef { session_id }) => {
            timer(state, &session_id, TimerCommand::Resume).await
        }
        ClientMessage::Stop(SessionRef { session_id }) => {
            timer(state, &session_id, TimerCommand::Stop).await
        }
        ClientMessage::SetDrill(SetDrillCommand {
            session_id,
            drill_index,
        }) => timer(state, &session_id, TimerCommand::SetDrill { drill_index }).await,
        ClientMessage::DrillCompleted(DrillCompletedCommand {
            session_id,
            drill_id,
            completed,
        }) => {
            rooms
                .relay(
                    &session_id,
                    ServerMessage::CompletionUpdate {
                        drill_id: drill_id.clone(),
                        completed,
                    },
                )
                .await?;
            persist_completion(state, session_id, drill_id, completed);
            Ok(CommandOutcome::Relayed)
        }
        ClientMessage::Note(NoteCommand {
            session_id,
            drill_id,
            text,
        }) => {
            let max = state.config().max_note_length();
            let length = text.chars().count();
            if length > max {
                return Err(ServiceError::InvalidCommand(format!(
                    "note must be at most {max} characters (got {length})"
                )));
            }
            rooms
                .relay(
                    &session_id,
                    ServerMessage::NoteUpdate {
                        drill_id: drill_id.clone(),
                        text: text.clone(),
                    },
                )
                .await?;
            persist_note(state, session_id, drill_id, text);
            Ok(CommandOutcome::Relayed)
        }
    }
}

/// Build the acknowledgement sent back to the issuer of `command`.
pub fn acknowledge(
    request_id: Option<String>,
    command: &str,
    result: &Result<CommandOutcome, ServiceError>,
) -> CommandAck {
    match result {
        Ok(outcome) => CommandAck::accepted(request_id, command, outcome.seq()),
        Err(err) => CommandAck::rejected(request_id, command, err),
    }
}

/// A joined connection may only address its own session; `join` switches sessions.
fn ensure_session_scope(handle: &SessionHandle, message: &ClientMessage) -> Result<(), ServiceError> {
    if matches!(message, ClientMessage::Join(_)) {
        return Ok(());
    }
    match handle.joined_session() {
        Some(joined) if joined != message.session_id() => Err(ServiceError::InvalidCommand(format!(
            "connection is joined to session `{joined}`, not `{}`",
            message.session_id()
        ))),
        _ => Ok(()),
    }
}

async fn timer(
    state: &SharedState,
    session_id: &str,
    command: TimerCommand,
) -> Result<CommandOutcome, ServiceError> {
    let next = state.rooms().apply(session_id, command).await?;
    Ok(CommandOutcome::Timer(next))
}

fn persist_completion(state: &SharedState, session_id: String, drill_id: String, completed: bool) {
    let write = state
        .directory()
        .record_completion(session_id.clone(), drill_id.clone(), completed);
    tokio::spawn(async move {
        if let Err(err) = write.await {
            warn!(%session_id, %drill_id, error = %err, "failed to persist drill completion");
        }
    });
}

fn persist_note(state: &SharedState, session_id: String, drill_id: String, text: String) {
    let write = state
        .directory()
        .record_note(session_id.clone(), drill_id.clone(), text);
    tokio::spawn(async move {
        if let Err(err) = write.await {
            warn!(%session_id, %drill_id, error = %err, "failed to persist drill note");
        }
    });
}
