use log::{debug, info};
use rusqlite::Connection;

use crate::config;
use crate::database;
use crate::database::models::User;
use crate::security::password::hash_password;
use crate::user::validation::{self, ValidationError};

/// User registration error types
#[derive(Debug, thiserror::Error)]
pub enum UserRegistrationError {
    #[error("Username already exists")]
    UsernameExists,

    #[error("Email address already exists")]
    EmailExists,

    #[error("Invalid username format")]
    InvalidUsername,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password validation failed: {0}")]
    PasswordValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Register a new user
pub fn register_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, UserRegistrationError> {
    debug!("Registering new user: {}", username);

    validation::validate_username(username).map_err(|_| UserRegistrationError::InvalidUsername)?;
    validation::validate_email(email).map_err(|_| UserRegistrationError::InvalidEmail)?;

    match validation::validate_password(password, Some(username)) {
        Ok(_) => {}
        Err(ValidationError::InternalError(msg)) => {
            return Err(UserRegistrationError::InternalError(msg));
        }
        Err(e) => {
            return Err(UserRegistrationError::PasswordValidationFailed(e.to_string()));
        }
    }

    if database::username_in_use(conn, username)
        .map_err(|e| UserRegistrationError::DatabaseError(e.to_string()))?
    {
        return Err(UserRegistrationError::UsernameExists);
    }

    if database::email_in_use(conn, email, None)
        .map_err(|e| UserRegistrationError::DatabaseError(e.to_string()))?
    {
        return Err(UserRegistrationError::EmailExists);
    }

    // Hash the password with Argon2id
    let memory_cost = config::get_config().security.password_memory_cost;
    let (password_hash, salt) = hash_password(password, memory_cost)
        .map_err(|e| UserRegistrationError::InternalError(format!("Failed to hash password: {}", e)))?;

    let user = User::new(
        username.to_string(),
        email.to_string(),
        password_hash,
        salt,
    );

    database::insert_user(conn, &user)
        .map_err(|e| UserRegistrationError::DatabaseError(e.to_string()))?;

    info!("Registered user {} ({})", username, user.id);
    Ok(user)
}
