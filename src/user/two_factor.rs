use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::database::models::{TwoFactorState, User};
use crate::notify::CodeNotifier;
use crate::security::otp;
use crate::security::password::CredentialVerifier;
use crate::user::store::{StoreError, UserStore};

/// Two-factor authentication errors
#[derive(Debug, PartialEq)]
pub enum TwoFactorError {
    /// Password confirmation failed or was missing
    InvalidCredentials,
    /// 2FA is not enabled for this account
    NotEnabled,
    /// No verification code has been issued
    NoChallengePending,
    /// The pending verification code has expired
    Expired,
    /// The submitted code does not match the pending one
    CodeMismatch,
    /// User not found
    UserNotFound,
    /// Database error
    DatabaseError(String),
    /// Unknown error
    Internal(String),
}

impl fmt::Display for TwoFactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwoFactorError::InvalidCredentials => write!(f, "Invalid password"),
            TwoFactorError::NotEnabled => write!(f, "Two-factor authentication is not enabled"),
            TwoFactorError::NoChallengePending => write!(f, "No verification code has been issued"),
            TwoFactorError::Expired => write!(f, "The verification code has expired"),
            TwoFactorError::CodeMismatch => write!(f, "Incorrect verification code"),
            TwoFactorError::UserNotFound => write!(f, "User not found"),
            TwoFactorError::DatabaseError(err) => write!(f, "Database error: {}", err),
            TwoFactorError::Internal(err) => write!(f, "Internal error: {}", err),
        }
    }
}

impl std::error::Error for TwoFactorError {}

impl From<StoreError> for TwoFactorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => TwoFactorError::UserNotFound,
            StoreError::Database(msg) => TwoFactorError::DatabaseError(msg),
        }
    }
}

/// Policy knobs for the two-factor lifecycle
#[derive(Debug, Clone)]
pub struct TwoFactorPolicy {
    /// Require the current password when enabling or disabling
    pub confirm_password: bool,
    /// How long an issued code stays valid
    pub code_ttl: Duration,
}

impl Default for TwoFactorPolicy {
    fn default() -> Self {
        Self {
            confirm_password: true,
            code_ttl: Duration::minutes(10),
        }
    }
}

/// Orchestrates the email-code two-factor lifecycle:
/// enable/disable with optional password confirmation, challenge issuance,
/// and single-use, time-bound verification.
///
/// Operations on any one user are serialized through a per-user lock, so two
/// concurrent challenges cannot leave two valid codes behind and a verify
/// cannot race a challenge on the same record.
pub struct TwoFactorService {
    store: Box<dyn UserStore>,
    verifier: Box<dyn CredentialVerifier>,
    notifier: Box<dyn CodeNotifier>,
    policy: TwoFactorPolicy,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TwoFactorService {
    pub fn new(
        store: Box<dyn UserStore>,
        verifier: Box<dyn CredentialVerifier>,
        notifier: Box<dyn CodeNotifier>,
        policy: TwoFactorPolicy,
    ) -> Self {
        Self {
            store,
            verifier,
            notifier,
            policy,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Enable two-factor authentication for a user.
    ///
    /// No code is generated here; codes are issued at the next login
    /// challenge. Enabling an already-enabled account is a no-op.
    pub fn enable(&self, user_id: &str, password: Option<&str>) -> Result<(), TwoFactorError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        let user = self.store.get(user_id)?;
        self.confirm_password(&user, password)?;

        if user.two_factor.enabled {
            debug!("2FA already enabled for user {}", user_id);
            return Ok(());
        }

        let mut state = user.two_factor;
        state.enabled = true;
        self.store.update_two_factor(user_id, &state)?;

        info!("2FA enabled for user {}", user_id);
        Ok(())
    }

    /// Disable two-factor authentication, dropping any pending challenge.
    ///
    /// Disabling an already-disabled account is a no-op.
    pub fn disable(&self, user_id: &str, password: Option<&str>) -> Result<(), TwoFactorError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        let user = self.store.get(user_id)?;
        self.confirm_password(&user, password)?;

        if !user.two_factor.enabled && !user.two_factor.has_pending_code() {
            debug!("2FA already disabled for user {}", user_id);
            return Ok(());
        }

        let mut state = user.two_factor;
        state.deactivate();
        self.store.update_two_factor(user_id, &state)?;

        info!("2FA disabled for user {}", user_id);
        Ok(())
    }

    /// Issue a fresh verification code for a pending login.
    ///
    /// Any previously pending code is replaced: at most one code is valid per
    /// user at a time. The code is handed to the notifier for delivery; a
    /// delivery failure is logged but does not invalidate the code. The code
    /// is returned to the caller for observability, never for display to the
    /// end user.
    pub fn challenge(&self, user_id: &str) -> Result<String, TwoFactorError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        let user = self.store.get(user_id)?;
        if !user.two_factor.enabled {
            return Err(TwoFactorError::NotEnabled);
        }

        let code = otp::generate_code();
        let expires_at = Utc::now() + self.policy.code_ttl;

        let mut state = user.two_factor;
        state.begin_challenge(code.clone(), expires_at);
        self.store.update_two_factor(user_id, &state)?;

        debug!("Issued verification code for user {}, valid until {}", user_id, expires_at);

        if let Err(err) = self.notifier.send_code(&user.email, &code) {
            // The code stays valid; the user can ask for a resend by
            // restarting the login
            warn!("Failed to deliver verification code to user {}: {}", user_id, err);
        }

        Ok(code)
    }

    /// Check a submitted code against the pending challenge.
    ///
    /// A correct code consumes the challenge: the same code can never verify
    /// twice. An expired challenge is cleared so the user has to request a
    /// new one. A mismatched code leaves the challenge in place and may be
    /// retried until it expires.
    pub fn verify(
        &self,
        user_id: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TwoFactorError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        let user = self.store.get(user_id)?;
        let mut state = user.two_factor;

        let (code, expires_at) = match (state.code.clone(), state.expires_at) {
            (Some(code), Some(expires_at)) => (code, expires_at),
            _ => return Err(TwoFactorError::NoChallengePending),
        };

        if now > expires_at {
            state.clear_challenge();
            self.store.update_two_factor(user_id, &state)?;
            debug!("Expired verification code cleared for user {}", user_id);
            return Err(TwoFactorError::Expired);
        }

        if submitted != code {
            debug!("Verification code mismatch for user {}", user_id);
            return Err(TwoFactorError::CodeMismatch);
        }

        state.clear_challenge();
        self.store.update_two_factor(user_id, &state)?;

        info!("Verification code accepted for user {}", user_id);
        Ok(())
    }

    /// Whether 2FA is enabled for the given user
    pub fn is_enabled(&self, user_id: &str) -> Result<bool, TwoFactorError> {
        let user = self.store.get(user_id)?;
        Ok(user.two_factor.enabled)
    }

    fn confirm_password(&self, user: &User, password: Option<&str>) -> Result<(), TwoFactorError> {
        if !self.policy.confirm_password {
            return Ok(());
        }

        let password = password.ok_or(TwoFactorError::InvalidCredentials)?;
        match self.verifier.verify(&user.id, password) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TwoFactorError::InvalidCredentials),
            Err(err) => Err(TwoFactorError::Internal(err.to_string())),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap();
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
