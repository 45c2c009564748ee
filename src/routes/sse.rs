//! Per-event SSE stream endpoint.

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/events/{event_id}",
    params(("event_id" = String, Path, description = "Event whose stream to join")),
    responses((status = 200, description = "Per-event SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime notifications for a single event.
pub async fn event_stream(
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state, event_id);
    info!(%event_id, "new SSE connection");
    let degraded = state.is_degraded().await;
    sse_service::broadcast_handshake(&state.channels().hub_for(event_id), event_id, degraded);
    sse_service::to_sse_stream(receiver, event_id)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/events/{event_id}", get(event_stream))
}
