//! Authoritative clock read endpoint.

use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::timer::{TimerSyncRequest, TimerSyncResponse},
    error::AppError,
    services::timer_service,
    state::SharedState,
};

/// Read the authoritative clock of an event.
///
/// Clients call this on connect and every few seconds thereafter; the
/// response carries the server wall-clock so they can compute their offset.
#[utoipa::path(
    post,
    path = "/timer-sync",
    tag = "timer",
    request_body = TimerSyncRequest,
    responses(
        (status = 200, description = "Current clock reading", body = TimerSyncResponse),
        (status = 404, description = "Unknown event"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn timer_sync(
    State(state): State<SharedState>,
    Json(payload): Json<TimerSyncRequest>,
) -> Result<Json<TimerSyncResponse>, AppError> {
    let response = timer_service::sync(&state, payload.event_id).await?;
    Ok(Json(response))
}

/// Configure the timer routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/timer-sync", post(timer_sync))
}
