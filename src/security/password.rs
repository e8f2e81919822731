use anyhow::{Result, Context};
use argon2::{
    password_hash::{SaltString, PasswordHasher, PasswordVerifier, PasswordHash},
    Argon2, Algorithm, Version, Params
};
use rand::rngs::OsRng;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::config;

/// Checks a plaintext password against a user's stored hash.
///
/// The two-factor service only needs a yes/no answer, so this is the whole
/// interface; password storage details stay behind it.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, user_id: &str, password: &str) -> Result<bool>;
}

/// Generate a random salt for password hashing
pub fn generate_salt() -> SaltString {
    SaltString::generate(&mut OsRng)
}

/// Hash a password using Argon2id
///
/// When a pepper is configured, the password is keyed through HMAC-SHA256
/// before hashing so database leaks alone are not enough to attack the
/// hashes offline.
pub fn hash_password(password: &str, memory_cost: u32) -> Result<(String, String)> {
    let salt = generate_salt();

    let peppered = apply_pepper(password, config::get_config().security.password_pepper.as_deref())?;

    // Configure Argon2id
    let argon2 = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(
            memory_cost, // Memory cost (kibibytes)
            2,           // Iterations
            1,           // Parallelism
            None,        // Output length (defaults to 32 bytes)
        ).map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?,
    );

    let password_hash = argon2.hash_password(peppered.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok((password_hash, salt.as_str().to_string()))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let peppered = apply_pepper(password, config::get_config().security.password_pepper.as_deref())?;

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    let result = Argon2::default().verify_password(peppered.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Key the password through HMAC-SHA256 with the pepper; identity when no
/// pepper is configured
fn apply_pepper(password: &str, pepper: Option<&str>) -> Result<String> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let pepper = match pepper {
        Some(p) => p,
        None => return Ok(password.to_string()),
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(pepper.as_bytes())
        .map_err(|e| anyhow::anyhow!("Failed to create HMAC: {}", e))?;
    mac.update(password.as_bytes());
    let result = mac.finalize().into_bytes();

    Ok(hex::encode(result))
}

/// Credential verifier backed by the users table
pub struct SqliteCredentialVerifier {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialVerifier {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl CredentialVerifier for SqliteCredentialVerifier {
    fn verify(&self, user_id: &str, password: &str) -> Result<bool> {
        debug!("Verifying credentials for user {}", user_id);

        let hash: Option<String> = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query password hash")?
        };

        match hash {
            Some(hash) => verify_password(password, &hash),
            None => Ok(false),
        }
    }
}
