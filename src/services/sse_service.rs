use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::{SharedState, SseHub},
};

/// Subscribe to the SSE stream of a single event.
pub fn subscribe(state: &SharedState, event_id: Uuid) -> broadcast::Receiver<ServerEvent> {
    state.channels().hub_for(event_id).subscribe()
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    event_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!(%event_id, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Push the connection handshake onto the event's hub.
pub fn broadcast_handshake(hub: &SseHub, event_id: Uuid, degraded: bool) {
    if let Ok(event) = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            event_id,
            message: "subscribed".into(),
            degraded,
        },
    ) {
        hub.broadcast(event);
    }
}
