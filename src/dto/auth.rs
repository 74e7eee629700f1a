use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_otp;

/// Request a login code for the primary member of a team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct OtpRequest {
    #[validate(email)]
    pub email: String,
}

/// Acknowledgement that a code was sent.
#[derive(Debug, Serialize, ToSchema)]
pub struct OtpRequestedResponse {
    pub message: String,
}

/// Exchange a login code for a session token.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_otp"))]
    pub otp: String,
}

/// Session opened after a successful OTP check.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    /// Token to send in the `X-Session-Token` header.
    pub token: String,
    pub team_id: Uuid,
    pub team_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_request_rejects_short_code() {
        let request = VerifyOtpRequest {
            email: "lead@team.dev".into(),
            otp: "123".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn otp_request_requires_email_shape() {
        let request = OtpRequest {
            email: "not-an-email".into(),
        };
        assert!(request.validate().is_err());
    }
}
