use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{sse::RoomEvent, validation::validate_identifier, ws::ServerMessage},
    error::ServiceError,
    state::{SharedState, Subscription},
};

/// Subscribe a read-only observer to the room of `session_id`.
pub async fn subscribe_session(
    state: &SharedState,
    session_id: &str,
) -> Result<Subscription, ServiceError> {
    validate_identifier(session_id)
        .map_err(|err| ServiceError::InvalidCommand(format!("invalid session id: {err}")))?;
    state.rooms().observe(session_id).await
}

/// Convert an observer subscription into an SSE response: the snapshot first, then
/// every room event until the client disconnects or the room is collected.
pub fn to_sse_stream(
    subscription: Subscription,
    session_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        snapshot,
        mut receiver,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        match RoomEvent::from_message(&ServerMessage::Snapshot(snapshot)) {
            Ok(event) => {
                if tx.send(Ok(to_event(event))).await.is_err() {
                    return;
                }
            }
            Err(err) => warn!(%session_id, error = %err, "failed to serialize snapshot"),
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(%session_id, skipped, "observer lagged behind room events");
                            continue;
                        }
                    }
                }
            }
        }

        info!(%session_id, "observer SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: RoomEvent) -> Event {
    Event::default().event(payload.event).data(payload.data)
}
