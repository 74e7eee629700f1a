use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::quiz::{BerserkResponse, QuizQuestionsResponse, SubmitRoundRequest, SubmitRoundResponse},
    error::AppError,
    services::{berserk_service, quiz_service, session_service},
    state::SharedState,
};

/// Endpoints used by logged-in teams while playing.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/quiz/questions", get(questions))
        .route("/quiz/submit_round", post(submit_round))
        .route("/quiz/berserk", post(berserk))
}

#[utoipa::path(
    get,
    path = "/quiz/questions",
    tag = "quiz",
    params(("X-Session-Token" = String, Header, description = "Team session token")),
    responses(
        (status = 200, description = "Questions of the active round", body = QuizQuestionsResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Team did not qualify")
    )
)]
/// Return the active round's questions without their answers.
pub async fn questions(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<QuizQuestionsResponse>, AppError> {
    let team = session_service::require_team(&state, &headers)?;
    Ok(Json(quiz_service::questions(&state, &team).await?))
}

#[utoipa::path(
    post,
    path = "/quiz/submit_round",
    tag = "quiz",
    params(("X-Session-Token" = String, Header, description = "Team session token")),
    request_body = SubmitRoundRequest,
    responses(
        (status = 200, description = "Answers scored", body = SubmitRoundResponse),
        (status = 401, description = "Not logged in"),
        (status = 409, description = "Round not open or already submitted")
    )
)]
/// Score and store the team's answers for round one or two.
pub async fn submit_round(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<SubmitRoundRequest>>,
) -> Result<Json<SubmitRoundResponse>, AppError> {
    let team = session_service::require_team(&state, &headers)?;
    Ok(Json(
        quiz_service::submit_round(&state, &team, payload.round, &payload.answers).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/quiz/berserk",
    tag = "quiz",
    params(("X-Session-Token" = String, Header, description = "Team session token")),
    responses(
        (status = 200, description = "Hit classified", body = BerserkResponse),
        (status = 400, description = "Round 3 not active or no question selected"),
        (status = 401, description = "Not logged in")
    )
)]
/// Press the buzzer on the selected round-three question.
pub async fn berserk(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<BerserkResponse>, AppError> {
    let team = session_service::require_team(&state, &headers)?;
    Ok(Json(berserk_service::record_hit(&state, &team).await?))
}
