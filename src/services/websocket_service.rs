use std::time::Duration;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        sse::RoomEvent,
        ws::{ClientEnvelope, CommandAck, ServerMessage},
    },
    services::gateway::{self, CommandOutcome, SessionHandle},
    state::{SharedState, presence::ConnectionId},
};

/// How a participant connection ended.
///
/// Every exit goes through the heartbeat window; only an explicit `leave`
/// command removes a participant right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionExit {
    /// The client sent a close frame (page reload, tab closed).
    Closed,
    /// Socket error, stream end without close, or a failed write.
    Dropped,
    /// No inbound frame within the idle timeout.
    IdleTimeout,
}

/// Handle the full lifecycle of a participant WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut connection = ParticipantConnection::new(outbound_tx.clone());
    let connection_id = connection.handle.connection_id();
    info!(%connection_id, "participant connected");

    let mut idle = IdleWatch::new(state.config().idle_timeout());
    let mut keepalive = tokio::time::interval(keepalive_period(idle.timeout));
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    keepalive.tick().await;

    let exit = loop {
        tokio::select! {
            message = receiver.next() => {
                idle.touch();
                match message {
                    Some(Ok(Message::Text(text))) => {
                        debug!(%connection_id, payload = %text, "received participant message");
                        connection.handle_text(&state, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let _ = outbound_tx.send(Message::Close(frame));
                        break ConnectionExit::Closed;
                    }
                    Some(Ok(Message::Binary(_) | Message::Pong(_))) => {}
                    Some(Err(err)) => {
                        warn!(%connection_id, error = %err, "websocket error");
                        break ConnectionExit::Dropped;
                    }
                    None => break ConnectionExit::Dropped,
                }
            }
            _ = keepalive.tick() => {
                if let Err(exit) = ping_or_expire(&idle, &outbound_tx) {
                    break exit;
                }
            }
        }
    };

    info!(%connection_id, exit = ?exit, "participant disconnected");
    connection.finish(&state).await;
    finalize(writer_task, outbound_tx).await;
}

/// Connection-scoped state: the gateway handle and the room feed forwarder.
struct ParticipantConnection {
    handle: SessionHandle,
    outbound: mpsc::UnboundedSender<Message>,
    forwarder: Option<JoinHandle<()>>,
}

impl ParticipantConnection {
    fn new(outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            handle: SessionHandle::new(),
            outbound,
            forwarder: None,
        }
    }

    /// Parse, dispatch and acknowledge one inbound text frame.
    async fn handle_text(&mut self, state: &SharedState, text: &str) {
        let connection_id = self.handle.connection_id();
        let ClientEnvelope {
            request_id,
            message,
        } = match ClientEnvelope::from_json_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%connection_id, error = %err, "failed to parse or validate participant message");
                self.send(&ServerMessage::Ack(CommandAck::rejected(None, "unknown", &err)));
                return;
            }
        };

        let command = message.kind();
        let result = gateway::dispatch(state, &mut self.handle, message).await;
        let ack = gateway::acknowledge(request_id, command, &result);
        if let Err(err) = &result {
            info!(%connection_id, command, error = %err, "command rejected");
        }
        self.send(&ServerMessage::Ack(ack));

        match result {
            Ok(CommandOutcome::Joined(subscription)) => {
                let session_id = subscription.snapshot.session_id.clone();
                self.send(&ServerMessage::Snapshot(subscription.snapshot));
                self.start_forwarding(state, session_id, subscription.receiver);
            }
            Ok(CommandOutcome::Left { .. }) => self.stop_forwarding(),
            Ok(CommandOutcome::Timer(_) | CommandOutcome::Relayed) | Err(_) => {}
        }
    }

    /// Forward the room's broadcast feed to this socket, replacing any previous feed.
    fn start_forwarding(
        &mut self,
        state: &SharedState,
        session_id: String,
        receiver: broadcast::Receiver<RoomEvent>,
    ) {
        self.stop_forwarding();
        self.forwarder = Some(tokio::spawn(forward_room_events(
            state.clone(),
            session_id,
            self.handle.connection_id(),
            receiver,
            self.outbound.clone(),
        )));
    }

    fn stop_forwarding(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }

    /// Hand the membership over to the heartbeat window.
    async fn finish(&mut self, state: &SharedState) {
        self.stop_forwarding();
        if let Some(session_id) = self.handle.joined_session() {
            state
                .rooms()
                .disconnect(session_id, self.handle.connection_id())
                .await;
        }
    }

    fn send(&self, message: &ServerMessage) {
        send_message_to_websocket(&self.outbound, message);
    }
}

/// Pump room events to one socket until the room or the socket goes away.
///
/// A lagged receiver may have missed the latest canonical state, so the
/// connection gets a fresh snapshot, which also resets its `seq` baseline.
async fn forward_room_events(
    state: SharedState,
    session_id: String,
    connection_id: ConnectionId,
    mut receiver: broadcast::Receiver<RoomEvent>,
    outbound: mpsc::UnboundedSender<Message>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if outbound.send(Message::Text(event.data.into())).is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(%connection_id, %session_id, skipped, "participant lagged behind room events");
                match state.rooms().status(&session_id).await {
                    Ok(status) => send_message_to_websocket(
                        &outbound,
                        &ServerMessage::Snapshot(status.snapshot),
                    ),
                    Err(err) => {
                        warn!(%connection_id, %session_id, error = %err, "resync snapshot unavailable")
                    }
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Inbound silence tracker of one socket.
struct IdleWatch {
    last_seen: Instant,
    timeout: Duration,
}

impl IdleWatch {
    fn new(timeout: Duration) -> Self {
        Self {
            last_seen: Instant::now(),
            timeout,
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn expired(&self) -> bool {
        self.last_seen.elapsed() >= self.timeout
    }
}

/// Ping the client, or give up once it stayed silent for the idle timeout.
fn ping_or_expire(
    idle: &IdleWatch,
    outbound: &mpsc::UnboundedSender<Message>,
) -> Result<(), ConnectionExit> {
    if idle.expired() {
        warn!(timeout_ms = idle.timeout.as_millis() as u64, "websocket idle timeout");
        return Err(ConnectionExit::IdleTimeout);
    }
    outbound
        .send(Message::Ping(Bytes::new()))
        .map_err(|_| ConnectionExit::Dropped)
}

/// Serialize a payload and push it onto the provided WebSocket sender.
pub fn send_message_to_websocket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T)
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    match serde_json::to_string(value) {
        Ok(payload) => {
            if tx.send(Message::Text(payload.into())).is_err() {
                debug!("websocket writer closed; dropping message");
            }
        }
        Err(err) => warn!(error = %err, "failed to serialize message `{value:?}`"),
    }
}

/// Ping often enough that a live client answers well within the idle timeout.
fn keepalive_period(idle_timeout: Duration) -> Duration {
    (idle_timeout / 2).max(Duration::from_millis(500))
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
