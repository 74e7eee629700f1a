use std::time::{Duration, Instant};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

/// Reasons an OTP verification fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("no code was requested for this email")]
    NotRequested,
    #[error("code expired")]
    Expired,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("invalid code")]
    Mismatch,
}

#[derive(Debug, Clone)]
struct PendingOtp {
    code: String,
    team_id: Uuid,
    issued_at: Instant,
    attempts: u32,
}

/// Logged-in team bound to a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSession {
    pub token: String,
    pub team_id: Uuid,
}

/// Outstanding OTP codes and open sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    pending: DashMap<String, PendingOtp>,
    sessions: DashMap<String, Uuid>,
    ttl: Duration,
    max_attempts: u32,
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl SessionRegistry {
    pub fn new(ttl: Duration, max_attempts: u32) -> Self {
        Self {
            pending: DashMap::new(),
            sessions: DashMap::new(),
            ttl,
            max_attempts,
        }
    }

    /// Generate a fresh six-digit code for `email`, replacing any earlier one.
    pub fn issue_otp(&self, email: &str, team_id: Uuid) -> String {
        let code = rand::rng().random_range(100_000..=999_999u32).to_string();
        self.pending.insert(
            email_key(email),
            PendingOtp {
                code: code.clone(),
                team_id,
                issued_at: Instant::now(),
                attempts: 0,
            },
        );
        code
    }

    /// Check `code` and open a session when it matches.
    pub fn verify(&self, email: &str, code: &str) -> Result<TeamSession, OtpError> {
        self.verify_at(email, code, Instant::now())
    }

    fn verify_at(&self, email: &str, code: &str, now: Instant) -> Result<TeamSession, OtpError> {
        let Entry::Occupied(mut slot) = self.pending.entry(email_key(email)) else {
            return Err(OtpError::NotRequested);
        };

        if now.saturating_duration_since(slot.get().issued_at) > self.ttl {
            slot.remove();
            return Err(OtpError::Expired);
        }

        let (attempts, matches) = {
            let pending = slot.get_mut();
            pending.attempts += 1;
            (pending.attempts, pending.code == code.trim())
        };
        if attempts > self.max_attempts {
            slot.remove();
            return Err(OtpError::TooManyAttempts);
        }
        if !matches {
            return Err(OtpError::Mismatch);
        }

        let team_id = slot.remove().team_id;
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), team_id);
        Ok(TeamSession { token, team_id })
    }

    /// Team bound to `token`, if the session is open.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        self.sessions.get(token).map(|entry| *entry.value())
    }

    /// Close a session; returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(300), 5)
    }

    #[test]
    fn issued_code_has_six_digits() {
        let registry = registry();
        let code = registry.issue_otp("lead@team.dev", Uuid::new_v4());
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(code.chars().next(), Some('0'));
    }

    #[test]
    fn valid_code_opens_session_once() {
        let registry = registry();
        let team_id = Uuid::new_v4();
        let code = registry.issue_otp("Lead@Team.dev", team_id);

        let session = registry.verify("lead@team.dev", &code).unwrap();
        assert_eq!(session.team_id, team_id);
        assert_eq!(registry.resolve(&session.token), Some(team_id));

        assert_eq!(
            registry.verify("lead@team.dev", &code),
            Err(OtpError::NotRequested)
        );
    }

    #[test]
    fn attempts_are_limited() {
        let registry = registry();
        let code = registry.issue_otp("lead@team.dev", Uuid::new_v4());
        for _ in 0..5 {
            assert_eq!(
                registry.verify("lead@team.dev", "000000"),
                Err(OtpError::Mismatch)
            );
        }
        assert_eq!(
            registry.verify("lead@team.dev", &code),
            Err(OtpError::TooManyAttempts)
        );
    }

    #[test]
    fn expired_code_is_rejected() {
        let registry = registry();
        let code = registry.issue_otp("lead@team.dev", Uuid::new_v4());
        let later = Instant::now() + Duration::from_secs(301);
        assert_eq!(
            registry.verify_at("lead@team.dev", &code, later),
            Err(OtpError::Expired)
        );
    }

    #[test]
    fn logout_closes_session() {
        let registry = registry();
        let code = registry.issue_otp("lead@team.dev", Uuid::new_v4());
        let session = registry.verify("lead@team.dev", &code).unwrap();
        assert!(registry.logout(&session.token));
        assert!(registry.resolve(&session.token).is_none());
        assert!(!registry.logout(&session.token));
    }
}
