use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::admin::{
        ActionResponse, CreateRound3QuestionRequest, DashboardResponse, GameStateRequest,
        GameStateResponse, HitLogResponse, QuestionBankImportRequest, QuestionBankImportResponse,
        Round3QuestionSummary, ScoreAdjustmentRequest, TeamImportRequest, TeamScore, TeamSummary,
    },
    error::AppError,
    services::{admin_service, question_bank},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Instructor-only endpoints driving the competition.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/game/state", get(get_game_state).put(set_game_state))
        .route("/admin/game/start", post(start_round))
        .route("/admin/game/finish", post(finish_round))
        .route("/admin/game/advance", post(advance_round))
        .route("/admin/teams", get(list_teams).post(import_teams))
        .route("/admin/questions/{round}", put(import_questions))
        .route("/admin/round3/questions", post(create_question))
        .route("/admin/round3/questions/deactivate", post(deactivate_all))
        .route("/admin/round3/questions/{id}/select", post(select_question))
        .route("/admin/round3/questions/{id}/activate", post(activate_question))
        .route("/admin/round3/score", post(adjust_score))
        .route("/admin/round3/hits", get(hit_log))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Everything the instructor panel needs in one call.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Instructor dashboard", body = DashboardResponse))
)]
pub async fn dashboard(State(state): State<SharedState>) -> Json<DashboardResponse> {
    Json(admin_service::dashboard(&state).await)
}

/// Current round, status and selected question.
#[utoipa::path(
    get,
    path = "/admin/game/state",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Game state", body = GameStateResponse))
)]
pub async fn get_game_state(State(state): State<SharedState>) -> Json<GameStateResponse> {
    Json(admin_service::game_state(&state).await)
}

/// Force the active round and status.
#[utoipa::path(
    put,
    path = "/admin/game/state",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = GameStateRequest,
    responses((status = 200, description = "Game state updated", body = GameStateResponse))
)]
pub async fn set_game_state(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameStateRequest>>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(admin_service::set_game_state(&state, payload).await?))
}

/// Open the active round (WAITING to ONGOING).
#[utoipa::path(
    post,
    path = "/admin/game/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Round started", body = GameStateResponse),
        (status = 409, description = "Round is not waiting")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(admin_service::start_round(&state).await?))
}

/// Close the active round (ONGOING to DONE).
#[utoipa::path(
    post,
    path = "/admin/game/finish",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Round finished", body = GameStateResponse),
        (status = 409, description = "Round is not ongoing")
    )
)]
pub async fn finish_round(
    State(state): State<SharedState>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(admin_service::finish_round(&state).await?))
}

/// Move to the next round once the current one is done.
#[utoipa::path(
    post,
    path = "/admin/game/advance",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Next round waiting", body = GameStateResponse),
        (status = 409, description = "Round not done or already the last one")
    )
)]
pub async fn advance_round(
    State(state): State<SharedState>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(admin_service::advance_round(&state).await?))
}

/// Registered teams.
#[utoipa::path(
    get,
    path = "/admin/teams",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Registered teams", body = [TeamSummary]))
)]
pub async fn list_teams(State(state): State<SharedState>) -> Json<Vec<TeamSummary>> {
    Json(admin_service::list_teams(&state))
}

/// Import team records from the registration service.
#[utoipa::path(
    post,
    path = "/admin/teams",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = TeamImportRequest,
    responses(
        (status = 200, description = "Teams registered", body = [TeamSummary]),
        (status = 409, description = "Primary member email already registered")
    )
)]
pub async fn import_teams(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<TeamImportRequest>>,
) -> Result<Json<Vec<TeamSummary>>, AppError> {
    Ok(Json(
        admin_service::import_teams(&state, payload.teams).await?,
    ))
}

/// Replace the question bank of round one or two with sheet rows.
#[utoipa::path(
    put,
    path = "/admin/questions/{round}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("round" = u8, Path, description = "Round (1 or 2) the rows belong to")),
    request_body = QuestionBankImportRequest,
    responses(
        (status = 200, description = "Question bank replaced", body = QuestionBankImportResponse),
        (status = 400, description = "Unknown round or no usable rows")
    )
)]
pub async fn import_questions(
    State(state): State<SharedState>,
    Path(round): Path<u8>,
    Valid(Json(payload)): Valid<Json<QuestionBankImportRequest>>,
) -> Result<Json<QuestionBankImportResponse>, AppError> {
    Ok(Json(
        question_bank::import(&state, round, &payload.rows).await?,
    ))
}

/// Add a buzzer-round question.
#[utoipa::path(
    post,
    path = "/admin/round3/questions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateRound3QuestionRequest,
    responses((status = 200, description = "Question created", body = Round3QuestionSummary))
)]
pub async fn create_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRound3QuestionRequest>>,
) -> Result<Json<Round3QuestionSummary>, AppError> {
    Ok(Json(
        admin_service::create_round3_question(&state, payload.text, payload.sequence_order)
            .await?,
    ))
}

/// Select a question without unlocking it.
#[utoipa::path(
    post,
    path = "/admin/round3/questions/{id}/select",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Question identifier")),
    responses(
        (status = 200, description = "Question selected", body = Round3QuestionSummary),
        (status = 404, description = "Unknown question")
    )
)]
pub async fn select_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Round3QuestionSummary>, AppError> {
    Ok(Json(admin_service::select_question(&state, id).await?))
}

/// Unlock a question for buzzing; every other question is locked.
#[utoipa::path(
    post,
    path = "/admin/round3/questions/{id}/activate",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Question identifier")),
    responses(
        (status = 200, description = "Question unlocked", body = Round3QuestionSummary),
        (status = 404, description = "Unknown question")
    )
)]
pub async fn activate_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Round3QuestionSummary>, AppError> {
    Ok(Json(admin_service::activate_question(&state, id).await?))
}

/// Lock every question.
#[utoipa::path(
    post,
    path = "/admin/round3/questions/deactivate",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "All questions locked", body = ActionResponse))
)]
pub async fn deactivate_all(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::deactivate_all(&state).await?;
    Ok(Json(ActionResponse::new("All questions deactivated.")))
}

/// Add or remove round-three points for a team.
#[utoipa::path(
    post,
    path = "/admin/round3/score",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = ScoreAdjustmentRequest,
    responses(
        (status = 200, description = "Score updated", body = TeamScore),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn adjust_score(
    State(state): State<SharedState>,
    Json(payload): Json<ScoreAdjustmentRequest>,
) -> Result<Json<TeamScore>, AppError> {
    Ok(Json(admin_service::adjust_score(&state, payload).await?))
}

/// Every hit on the selected question, illegal ones included.
#[utoipa::path(
    get,
    path = "/admin/round3/hits",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Hit log", body = HitLogResponse))
)]
pub async fn hit_log(State(state): State<SharedState>) -> Json<HitLogResponse> {
    Json(admin_service::hit_log(&state).await)
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

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
