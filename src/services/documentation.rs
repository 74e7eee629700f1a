use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for TechQuiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::public::game_status,
        crate::routes::public::leaderboard,
        crate::routes::auth::request_otp,
        crate::routes::auth::verify_otp,
        crate::routes::auth::logout,
        crate::routes::quiz::questions,
        crate::routes::quiz::submit_round,
        crate::routes::quiz::berserk,
        crate::routes::admin::dashboard,
        crate::routes::admin::get_game_state,
        crate::routes::admin::set_game_state,
        crate::routes::admin::start_round,
        crate::routes::admin::finish_round,
        crate::routes::admin::advance_round,
        crate::routes::admin::list_teams,
        crate::routes::admin::import_teams,
        crate::routes::admin::import_questions,
        crate::routes::admin::create_question,
        crate::routes::admin::select_question,
        crate::routes::admin::activate_question,
        crate::routes::admin::deactivate_all,
        crate::routes::admin::adjust_score,
        crate::routes::admin::hit_log,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::BuzzerInboundMessage,
            crate::dto::ws::BuzzerOutboundMessage,
            crate::dto::ws::BuzzerAck,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::BerserkHitEvent,
            crate::dto::sse::LeaderboardUpdatedEvent,
            crate::dto::sse::ScoreUpdatedEvent,
            crate::dto::sse::QuestionChangedEvent,
            crate::state::game::RoundStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "buzzers", description = "WebSocket operations for buzzer clients"),
        (name = "public", description = "Round status and leaderboard"),
        (name = "auth", description = "OTP login for team primary members"),
        (name = "quiz", description = "Team answers and buzzer hits"),
        (name = "admin", description = "Instructor control panel"),
    )
)]
pub struct ApiDoc;
