use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, info};

/// Failure reported by a mail transport.
#[derive(Debug, Error)]
#[error("failed to deliver OTP mail: {0}")]
pub struct MailerError(pub String);

/// Outbound channel used to hand login codes to team members.
pub trait OtpMailer: Send + Sync {
    fn send_otp(
        &self,
        email: String,
        team_name: String,
        code: String,
    ) -> BoxFuture<'static, Result<(), MailerError>>;
}

/// Mailer that writes codes to the log; stands in for a real transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl OtpMailer for LogMailer {
    fn send_otp(
        &self,
        email: String,
        team_name: String,
        code: String,
    ) -> BoxFuture<'static, Result<(), MailerError>> {
        Box::pin(async move {
            info!(%email, team = %team_name, "OTP issued");
            debug!(%email, %code, "OTP code");
            Ok(())
        })
    }
}
