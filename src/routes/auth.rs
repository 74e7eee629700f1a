use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::auth::{OtpRequest, OtpRequestedResponse, SessionResponse, VerifyOtpRequest},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// OTP login for team primary members.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/otp", post(request_otp))
        .route("/auth/verify", post(verify_otp))
        .route("/auth/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/auth/otp",
    tag = "auth",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code sent", body = OtpRequestedResponse),
        (status = 404, description = "Email not registered as Primary Member.")
    )
)]
/// Send a six-digit login code to the primary member of a team.
pub async fn request_otp(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<OtpRequest>>,
) -> Result<Json<OtpRequestedResponse>, AppError> {
    Ok(Json(
        session_service::request_otp(&state, &payload.email).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 403, description = "Too many attempts")
    )
)]
/// Exchange a login code for a session token.
pub async fn verify_otp(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<VerifyOtpRequest>>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(
        session_service::verify_otp(&state, &payload.email, &payload.otp).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    params(("X-Session-Token" = String, Header, description = "Team session token")),
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "Unknown session")
    )
)]
/// Close the caller's session.
pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    session_service::logout(&state, &headers)?;
    Ok(StatusCode::NO_CONTENT)
}
