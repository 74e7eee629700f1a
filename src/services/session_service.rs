//! OTP login for team primary members and session token resolution.

use axum::http::HeaderMap;
use tracing::{info, warn};

use crate::{
    dto::auth::{OtpRequestedResponse, SessionResponse},
    error::ServiceError,
    state::{SharedState, game::Team},
};

/// Header carrying the team session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Issue a login code for the team whose primary member owns `email`.
pub async fn request_otp(
    state: &SharedState,
    email: &str,
) -> Result<OtpRequestedResponse, ServiceError> {
    let Some(team) = state.team_by_primary_email(email) else {
        info!(%email, "OTP requested for unknown primary email");
        return Err(ServiceError::NotFound(
            "Email not registered as Primary Member.".into(),
        ));
    };

    let code = state.sessions().issue_otp(email, team.id);
    state
        .mailer()
        .send_otp(email.trim().to_owned(), team.name.clone(), code)
        .await?;

    Ok(OtpRequestedResponse {
        message: format!("OTP sent to {}", email.trim()),
    })
}

/// Exchange a code for a session token.
pub async fn verify_otp(
    state: &SharedState,
    email: &str,
    code: &str,
) -> Result<SessionResponse, ServiceError> {
    let session = state.sessions().verify(email, code).inspect_err(|err| {
        warn!(%email, error = %err, "OTP verification failed");
    })?;
    let team_name = state
        .team_name(session.team_id)
        .ok_or_else(|| ServiceError::NotFound("team no longer registered".into()))?;

    info!(team_id = %session.team_id, team = %team_name, "team logged in");
    Ok(SessionResponse {
        token: session.token,
        team_id: session.team_id,
        team_name,
    })
}

/// Close the session carried by `headers`.
pub fn logout(state: &SharedState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let token = session_token(headers)
        .ok_or_else(|| ServiceError::Unauthorized("missing session token".into()))?;
    if state.sessions().logout(token) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("unknown session".into()))
    }
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Team bound to `token`, if the session is open and the team still exists.
pub fn team_for_token(state: &SharedState, token: &str) -> Option<Team> {
    let team_id = state.sessions().resolve(token)?;
    state.teams().get(&team_id).map(|team| team.value().clone())
}

/// Team of the caller, or 401.
pub fn require_team(state: &SharedState, headers: &HeaderMap) -> Result<Team, ServiceError> {
    optional_team(state, headers).ok_or_else(|| ServiceError::Unauthorized("Not logged in".into()))
}

/// Team of the caller when a valid session header is present.
pub fn optional_team(state: &SharedState, headers: &HeaderMap) -> Option<Team> {
    session_token(headers).and_then(|token| team_for_token(state, token))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::SystemTime,
    };

    use axum::http::HeaderValue;
    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        services::mailer::{MailerError, OtpMailer},
        state::{
            AppState,
            game::{Member, Team},
        },
    };

    #[derive(Default)]
    struct CapturingMailer {
        codes: Mutex<Vec<(String, String)>>,
    }

    impl OtpMailer for CapturingMailer {
        fn send_otp(
            &self,
            email: String,
            _team_name: String,
            code: String,
        ) -> BoxFuture<'static, Result<(), MailerError>> {
            self.codes.lock().unwrap().push((email, code));
            Box::pin(async { Ok(()) })
        }
    }

    fn member(email: &str) -> Member {
        Member {
            name: "member".into(),
            email: email.into(),
            phone: None,
        }
    }

    fn setup() -> (SharedState, Arc<CapturingMailer>, Team) {
        let mailer = Arc::new(CapturingMailer::default());
        let state = AppState::new(AppConfig::default(), mailer.clone());
        let team = Team {
            id: Uuid::new_v4(),
            name: "Segfault Squad".into(),
            department: "IT".into(),
            year: "SE".into(),
            primary: member("lead@team.dev"),
            supporting: member("help@team.dev"),
            supporting_department: None,
            supporting_year: None,
            created_at: SystemTime::now(),
        };
        state.teams().insert(team.id, team.clone());
        (state, mailer, team)
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (state, _, _) = setup();
        let err = request_otp(&state, "help@team.dev").await.unwrap_err();
        assert!(
            matches!(err, ServiceError::NotFound(message) if message == "Email not registered as Primary Member.")
        );
    }

    #[tokio::test]
    async fn login_round_trip_opens_and_closes_a_session() {
        let (state, mailer, team) = setup();
        request_otp(&state, "LEAD@team.dev").await.unwrap();
        let code = mailer.codes.lock().unwrap()[0].1.clone();

        let session = verify_otp(&state, "lead@team.dev", &code).await.unwrap();
        assert_eq!(session.team_id, team.id);
        assert_eq!(session.team_name, "Segfault Squad");

        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&session.token).unwrap());
        assert_eq!(require_team(&state, &headers).unwrap().id, team.id);

        logout(&state, &headers).unwrap();
        assert!(matches!(
            require_team(&state, &headers),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let (state, _, _) = setup();
        request_otp(&state, "lead@team.dev").await.unwrap();
        assert!(matches!(
            verify_otp(&state, "lead@team.dev", "000000").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
