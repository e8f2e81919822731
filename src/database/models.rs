use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Per-user two-factor authentication record.
///
/// `code` and `expires_at` are either both present (a challenge is pending)
/// or both absent. A disabled record never carries a pending challenge.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TwoFactorState {
    pub enabled: bool,
    pub code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TwoFactorState {
    /// The initial state of every account: 2FA off, nothing pending.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            code: None,
            expires_at: None,
        }
    }

    /// Whether a challenge is currently pending
    pub fn has_pending_code(&self) -> bool {
        self.code.is_some()
    }

    /// Install a fresh challenge, replacing any pending one
    pub fn begin_challenge(&mut self, code: String, expires_at: DateTime<Utc>) {
        self.code = Some(code);
        self.expires_at = Some(expires_at);
    }

    /// Remove the pending challenge, if any
    pub fn clear_challenge(&mut self) {
        self.code = None;
        self.expires_at = None;
    }

    /// Turn 2FA off and drop any pending challenge
    pub fn deactivate(&mut self) {
        self.enabled = false;
        self.clear_challenge();
    }
}

impl Default for TwoFactorState {
    fn default() -> Self {
        Self::disabled()
    }
}

/// User model
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub two_factor: TwoFactorState,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String, salt: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            salt,
            two_factor: TwoFactorState::disabled(),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_user_starts_without_two_factor() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            "salt".to_string(),
        );

        assert!(!user.two_factor.enabled);
        assert!(user.two_factor.code.is_none());
        assert!(user.two_factor.expires_at.is_none());
    }

    #[test]
    fn test_challenge_fields_move_together() {
        let mut state = TwoFactorState::disabled();
        state.enabled = true;

        state.begin_challenge("123456".to_string(), Utc::now() + Duration::minutes(10));
        assert!(state.has_pending_code());
        assert!(state.code.is_some() && state.expires_at.is_some());

        state.clear_challenge();
        assert!(!state.has_pending_code());
        assert!(state.code.is_none() && state.expires_at.is_none());
    }

    #[test]
    fn test_deactivate_clears_pending_challenge() {
        let mut state = TwoFactorState::disabled();
        state.enabled = true;
        state.begin_challenge("654321".to_string(), Utc::now() + Duration::minutes(10));

        state.deactivate();
        assert!(!state.enabled);
        assert!(state.code.is_none());
        assert!(state.expires_at.is_none());
    }
}
