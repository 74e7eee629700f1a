//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that an OTP is exactly six ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_otp("482913") // Ok
/// validate_otp("48291")  // Err - too short
/// validate_otp("48291a") // Err - not a digit
/// ```
pub fn validate_otp(code: &str) -> Result<(), ValidationError> {
    if code.len() != 6 {
        let mut err = ValidationError::new("otp_length");
        err.message = Some(format!("OTP must be exactly 6 digits (got {})", code.len()).into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("otp_format");
        err.message = Some("OTP must contain only digits".into());
        return Err(err);
    }

    Ok(())
}
