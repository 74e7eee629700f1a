use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};

use crate::{
    dto::public::{GameStatusResponse, LeaderboardResponse, NoQuery},
    services::{public_service, session_service},
    state::SharedState,
};

/// Read-only endpoints polled by team pages and the projector.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/status", get(game_status))
        .route("/leaderboard", get(leaderboard))
}

#[utoipa::path(
    get,
    path = "/game/status",
    tag = "public",
    params(("X-Session-Token" = Option<String>, Header, description = "Team session token; anonymous callers get neutral values")),
    responses((status = 200, description = "Round progress for the caller", body = GameStatusResponse))
)]
/// Return the active round and the caller's submission and qualification state.
pub async fn game_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(_no_query): Query<NoQuery>,
) -> Json<GameStatusResponse> {
    let team = session_service::optional_team(&state, &headers);
    Json(public_service::game_status(&state, team.as_ref()).await)
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "public",
    responses((status = 200, description = "Leaderboard of the active round", body = LeaderboardResponse))
)]
/// Return the top teams of the active round, or the buzzer order in round three.
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(_no_query): Query<NoQuery>,
) -> Json<LeaderboardResponse> {
    Json(public_service::leaderboard(&state).await)
}
