use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::debug;

use crate::config::SmtpConfig;
use crate::notify::{CodeNotifier, DeliveryError};

/// Mails verification codes through an SMTP relay
pub struct SmtpNotifier {
    host: String,
    credentials: Credentials,
    from_address: String,
    ttl_minutes: u32,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, ttl_minutes: u32) -> Self {
        Self {
            host: config.host.clone(),
            credentials: Credentials::new(config.username.clone(), config.password.clone()),
            from_address: config.from_address.clone(),
            ttl_minutes,
        }
    }

    fn build_message(&self, email: &str, code: &str) -> Result<Message, DeliveryError> {
        let from = self
            .from_address
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(self.from_address.clone()))?;
        let to = email
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(email.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject("Your verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Your two-factor authentication code is {}.\n\n\
                 It expires in {} minutes. If you did not try to log in, you \
                 can ignore this message.\n",
                code, self.ttl_minutes
            ))
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }
}

impl CodeNotifier for SmtpNotifier {
    fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError> {
        let message = self.build_message(email, code)?;

        let mailer = SmtpTransport::relay(&self.host)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .credentials(self.credentials.clone())
            .build();

        mailer
            .send(&message)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        debug!("Verification code mailed via {}", self.host);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new(
            &SmtpConfig {
                enabled: true,
                host: "smtp.example.com".to_string(),
                username: "mailer".to_string(),
                password: "secret".to_string(),
                from_address: "no-reply@example.com".to_string(),
            },
            10,
        )
    }

    #[test]
    fn test_message_contains_code_and_ttl() {
        let notifier = notifier();
        let message = notifier.build_message("user@example.com", "519204").unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("519204"));
        assert!(raw.contains("10 minutes"));
        assert!(raw.contains("user@example.com"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let notifier = notifier();
        let err = notifier.build_message("not an address", "519204").unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress(_)));
    }
}
