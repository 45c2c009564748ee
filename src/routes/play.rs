//! Player-facing endpoints, authenticated by session token.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::play::{
        JoinTeamRequest, JoinTeamResponse, UseHintRequest, UseHintResponse, ValidateCodeRequest,
        ValidateCodeResponse,
    },
    error::AppError,
    services::{code_service, hint_service, team_service},
    state::SharedState,
};

const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Player-facing endpoints: joining, code submission, hints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/join-team", post(join_team))
        .route("/validate-code", post(validate_code))
        .route("/use-hint", post(use_hint))
}

/// Join a team by its join code and receive a session token.
#[utoipa::path(
    post,
    path = "/join-team",
    tag = "play",
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Joined; the session token authenticates later calls", body = JoinTeamResponse),
        (status = 404, description = "Unknown event or join code"),
        (status = 409, description = "Event not joinable or team full")
    )
)]
pub async fn join_team(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinTeamRequest>>,
) -> Result<Json<JoinTeamResponse>, AppError> {
    let response = team_service::join_team(&state, payload).await?;
    Ok(Json(response))
}

/// Submit an unlock code against the caller's active stage.
#[utoipa::path(
    post,
    path = "/validate-code",
    tag = "play",
    request_body = ValidateCodeRequest,
    params(("X-Session-Token" = String, Header, description = "Session token issued by /join-team")),
    responses(
        (status = 200, description = "Submission outcome, wrong codes included", body = ValidateCodeResponse),
        (status = 401, description = "Missing or unknown session token"),
        (status = 409, description = "Stage not submittable")
    )
)]
pub async fn validate_code(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<ValidateCodeRequest>>,
) -> Result<Json<ValidateCodeResponse>, AppError> {
    let token = session_token(&headers)?;
    let response = code_service::submit_code(&state, &token, payload).await?;
    Ok(Json(response))
}

/// Reveal a hint for the caller's team, charging one coin on first use.
#[utoipa::path(
    post,
    path = "/use-hint",
    tag = "play",
    request_body = UseHintRequest,
    params(("X-Session-Token" = String, Header, description = "Session token issued by /join-team")),
    responses(
        (status = 200, description = "Reveal, replay, or denial", body = UseHintResponse),
        (status = 401, description = "Missing or unknown session token")
    )
)]
pub async fn use_hint(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<UseHintRequest>>,
) -> Result<Json<UseHintResponse>, AppError> {
    let token = session_token(&headers)?;
    let response = hint_service::use_hint(&state, &token, payload).await?;
    Ok(Json(response))
}

fn session_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing session token header `X-Session-Token`".into())
        })
}
