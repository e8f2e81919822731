use log::debug;
use regex::Regex;

use crate::config;
use crate::user::{EMAIL_REGEX, MAX_EMAIL_LENGTH};

/// Validation error types
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Password must be at least {0} characters long")]
    PasswordTooShort(usize),

    #[error("Password must not match the username")]
    PasswordMatchesUsername,

    #[error("Password confirmation does not match")]
    PasswordConfirmationMismatch,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid username format")]
    InvalidUsername,

    #[error("Internal validation error: {0}")]
    InternalError(String),
}

/// Validate a password against the configured policy
pub fn validate_password(password: &str, username: Option<&str>) -> Result<(), ValidationError> {
    debug!("Validating password strength");

    let min_length = config::get_config().security.min_password_length;
    if password.chars().count() < min_length {
        return Err(ValidationError::PasswordTooShort(min_length));
    }

    if let Some(username) = username {
        if password.eq_ignore_ascii_case(username) {
            return Err(ValidationError::PasswordMatchesUsername);
        }
    }

    Ok(())
}

/// Validate a password along with its confirmation
pub fn validate_password_confirmed(
    password: &str,
    confirmation: &str,
    username: Option<&str>,
) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordConfirmationMismatch);
    }
    validate_password(password, username)
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail);
    }

    let re = Regex::new(EMAIL_REGEX)
        .map_err(|e| ValidationError::InternalError(format!("Regex error: {}", e)))?;

    if !re.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

/// Validate a username: 3-32 characters, alphanumeric plus underscore,
/// starting with a letter
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let re = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{2,31}$")
        .map_err(|e| ValidationError::InternalError(format!("Regex error: {}", e)))?;

    if !re.is_match(username) {
        return Err(ValidationError::InvalidUsername);
    }

    Ok(())
}
