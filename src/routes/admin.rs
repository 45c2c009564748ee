//! Organizer endpoints, guarded by the admin token.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::admin::{
        CreateEventRequest, EventControlRequest, EventControlResponse, EventDetailResponse,
    },
    error::AppError,
    services::event_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Organizer-only endpoints for creating and driving events.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/events", post(create_event))
        .route("/admin/events/{id}", get(get_event))
        .route("/admin/event-control", post(event_control))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Create an event with its teams, stages, and hints in one request.
#[utoipa::path(
    post,
    path = "/admin/events",
    tag = "admin",
    request_body = CreateEventRequest,
    params(("X-Admin-Token" = String, Header, description = "Organizer token")),
    responses(
        (status = 200, description = "Event created", body = EventDetailResponse),
        (status = 400, description = "Invalid or duplicate codes"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn create_event(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateEventRequest>>,
) -> Result<Json<EventDetailResponse>, AppError> {
    let detail = event_service::create_event(&state, payload).await?;
    Ok(Json(detail))
}

/// Retrieve the full organizer view of an event.
#[utoipa::path(
    get,
    path = "/admin/events/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Organizer token"),
        ("id" = String, Path, description = "Identifier of the event to retrieve")
    ),
    responses(
        (status = 200, description = "Event with teams, stages, and hints", body = EventDetailResponse),
        (status = 404, description = "Unknown event")
    )
)]
pub async fn get_event(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventDetailResponse>, AppError> {
    let detail = event_service::get_event(&state, id).await?;
    Ok(Json(detail))
}

/// Apply a clock transition (start, pause, resume, end, reset) to an event.
#[utoipa::path(
    post,
    path = "/admin/event-control",
    tag = "admin",
    request_body = EventControlRequest,
    params(("X-Admin-Token" = String, Header, description = "Organizer token")),
    responses(
        (status = 200, description = "Transition applied", body = EventControlResponse),
        (status = 404, description = "Unknown event"),
        (status = 409, description = "Transition not legal from the current status")
    )
)]
pub async fn event_control(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<EventControlRequest>>,
) -> Result<Json<EventControlResponse>, AppError> {
    let response = event_service::control(&state, payload).await?;
    Ok(Json(response))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if provided == state.config().admin_token {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin token".into()))
    }
}
