// Verification code delivery.
//
// The two-factor service hands codes to a `CodeNotifier`; whether they go out
// over SMTP or to the local terminal is a deployment decision.

pub mod smtp;

pub use smtp::SmtpNotifier;

/// Delivery error types
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Delivers a verification code to a user's registered email address.
///
/// Delivery is best-effort from the service's point of view: a failure is
/// reported to the caller but never rolls back the issued code.
#[cfg_attr(test, mockall::automock)]
pub trait CodeNotifier: Send + Sync {
    fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError>;
}

/// Prints codes to the terminal instead of mailing them. For local use when
/// no SMTP relay is configured.
pub struct ConsoleNotifier;

impl CodeNotifier for ConsoleNotifier {
    fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError> {
        println!("📧 [console delivery] Verification code for {}: {}", email, code);
        Ok(())
    }
}
