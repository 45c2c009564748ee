use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Escape Hunt Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::event_stream,
        crate::routes::timer::timer_sync,
        crate::routes::play::join_team,
        crate::routes::play::validate_code,
        crate::routes::play::use_hint,
        crate::routes::admin::create_event,
        crate::routes::admin::get_event,
        crate::routes::admin::event_control,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::timer::TimerSyncRequest,
            crate::dto::timer::TimerSyncResponse,
            crate::dto::play::JoinTeamRequest,
            crate::dto::play::JoinTeamResponse,
            crate::dto::play::TeamSummary,
            crate::dto::play::ValidateCodeRequest,
            crate::dto::play::ValidateCodeResponse,
            crate::dto::play::StageSummary,
            crate::dto::play::UseHintRequest,
            crate::dto::play::UseHintResponse,
            crate::dto::play::HintReveal,
            crate::dto::play::HintDenyReason,
            crate::dto::admin::CreateEventRequest,
            crate::dto::admin::TeamInput,
            crate::dto::admin::StageInput,
            crate::dto::admin::HintInput,
            crate::dto::admin::EventControlRequest,
            crate::dto::admin::ControlAction,
            crate::dto::admin::ControlOptions,
            crate::dto::admin::EventControlResponse,
            crate::dto::admin::EventSummary,
            crate::dto::admin::EventDetailResponse,
            crate::dto::admin::StageDetail,
            crate::dto::admin::HintDetail,
            crate::dao::models::EventStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "timer", description = "Authoritative clock synchronization"),
        (name = "play", description = "Player-facing gameplay operations"),
        (name = "admin", description = "Organizer event management"),
    )
)]
pub struct ApiDoc;
