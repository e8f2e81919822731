use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::database;
use crate::security::password::{hash_password, verify_password};
use crate::user::validation::{self, ValidationError};

/// User profile error types
#[derive(Debug, thiserror::Error)]
pub enum UserProfileError {
    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Email address already exists")]
    EmailExists,

    #[error("Invalid username format")]
    InvalidUsername,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Current password is incorrect")]
    CurrentPasswordMismatch,

    #[error("Password validation failed: {0}")]
    PasswordValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Public view of a user record, safe to display
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub two_factor_enabled: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Get user profile by ID
pub fn get_user_profile(conn: &Connection, user_id: &str) -> Result<UserProfile, UserProfileError> {
    debug!("Getting user profile for ID: {}", user_id);

    let user = database::get_user_by_id(conn, user_id)
        .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?
        .ok_or(UserProfileError::UserNotFound)?;

    Ok(UserProfile {
        id: user.id,
        username: user.username,
        email: user.email,
        two_factor_enabled: user.two_factor.enabled,
        last_login: user.last_login,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

/// Update a user's username and email.
///
/// Uniqueness checks ignore the user's own current values, so re-submitting
/// an unchanged profile succeeds.
pub fn update_user_profile(
    conn: &Connection,
    user_id: &str,
    username: &str,
    email: &str,
) -> Result<(), UserProfileError> {
    debug!("Updating profile for user {}", user_id);

    validation::validate_username(username).map_err(|_| UserProfileError::InvalidUsername)?;
    validation::validate_email(email).map_err(|_| UserProfileError::InvalidEmail)?;

    let user = database::get_user_by_id(conn, user_id)
        .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?
        .ok_or(UserProfileError::UserNotFound)?;

    if username != user.username {
        if database::username_in_use(conn, username)
            .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?
        {
            return Err(UserProfileError::UsernameExists);
        }
    }

    if database::email_in_use(conn, email, Some(user_id))
        .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?
    {
        return Err(UserProfileError::EmailExists);
    }

    database::update_profile_fields(conn, user_id, username, email)
        .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?;

    info!("Profile updated for user {}", user_id);
    Ok(())
}

/// Change a user's password, requiring the current one
pub fn change_password(
    conn: &Connection,
    user_id: &str,
    current_password: &str,
    new_password: &str,
    confirmation: &str,
) -> Result<(), UserProfileError> {
    debug!("Changing password for user {}", user_id);

    let user = database::get_user_by_id(conn, user_id)
        .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?
        .ok_or(UserProfileError::UserNotFound)?;

    let current_ok = verify_password(current_password, &user.password_hash)
        .map_err(|e| UserProfileError::InternalError(e.to_string()))?;
    if !current_ok {
        return Err(UserProfileError::CurrentPasswordMismatch);
    }

    match validation::validate_password_confirmed(new_password, confirmation, Some(&user.username)) {
        Ok(_) => {}
        Err(ValidationError::InternalError(msg)) => {
            return Err(UserProfileError::InternalError(msg));
        }
        Err(e) => {
            return Err(UserProfileError::PasswordValidationFailed(e.to_string()));
        }
    }

    let memory_cost = config::get_config().security.password_memory_cost;
    let (password_hash, salt) = hash_password(new_password, memory_cost)
        .map_err(|e| UserProfileError::InternalError(format!("Failed to hash password: {}", e)))?;

    database::update_password_hash(conn, user_id, &password_hash, &salt)
        .map_err(|e| UserProfileError::DatabaseError(e.to_string()))?;

    info!("Password changed for user {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;
    use crate::user::registration::register_user;

    fn setup_with_user() -> (Connection, String) {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::create_schema(&mut conn).unwrap();
        let user = register_user(&conn, "frank", "frank@example.com", "original password").unwrap();
        (conn, user.id)
    }

    #[test]
    fn test_get_profile() {
        let (conn, user_id) = setup_with_user();

        let profile = get_user_profile(&conn, &user_id).unwrap();
        assert_eq!(profile.username, "frank");
        assert_eq!(profile.email, "frank@example.com");
        assert!(!profile.two_factor_enabled);

        assert!(matches!(
            get_user_profile(&conn, "missing"),
            Err(UserProfileError::UserNotFound)
        ));
    }

    #[test]
    fn test_update_profile_allows_own_email() {
        let (conn, user_id) = setup_with_user();

        // Unchanged email is not a conflict
        update_user_profile(&conn, &user_id, "frank", "frank@example.com").unwrap();

        update_user_profile(&conn, &user_id, "franklin", "franklin@example.com").unwrap();
        let profile = get_user_profile(&conn, &user_id).unwrap();
        assert_eq!(profile.username, "franklin");
        assert_eq!(profile.email, "franklin@example.com");
    }

    #[test]
    fn test_update_profile_rejects_taken_email() {
        let (conn, user_id) = setup_with_user();
        register_user(&conn, "grace", "grace@example.com", "another password").unwrap();

        assert!(matches!(
            update_user_profile(&conn, &user_id, "frank", "grace@example.com"),
            Err(UserProfileError::EmailExists)
        ));
    }

    #[test]
    fn test_change_password() {
        let (conn, user_id) = setup_with_user();

        assert!(matches!(
            change_password(&conn, &user_id, "wrong", "replacement pw", "replacement pw"),
            Err(UserProfileError::CurrentPasswordMismatch)
        ));

        assert!(matches!(
            change_password(&conn, &user_id, "original password", "replacement pw", "different"),
            Err(UserProfileError::PasswordValidationFailed(_))
        ));

        change_password(&conn, &user_id, "original password", "replacement pw", "replacement pw")
            .unwrap();

        let user = database::get_user_by_id(&conn, &user_id).unwrap().unwrap();
        assert!(verify_password("replacement pw", &user.password_hash).unwrap());
        assert!(!verify_password("original password", &user.password_hash).unwrap());
    }
}
