use anyhow::{Result, anyhow};
use chrono::Utc;
use log::error;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::cli::utils::{read_line, read_password};
use crate::database;
use crate::security::password::verify_password;
use crate::user::two_factor::{TwoFactorError, TwoFactorService};

const CODE_PROMPT_ATTEMPTS: u32 = 3;

/// Handle user login
pub fn login(conn: &Arc<Mutex<Connection>>, service: &TwoFactorService, username: &str) -> Result<()> {
    let password = read_password("Password: ")?;

    match perform_login(conn, service, username, &password) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Login failed for {}: {}", username, e);
            println!("\n❌ Login failed: {}", e);
            Err(e)
        }
    }
}

/// Perform the login process
fn perform_login(
    conn: &Arc<Mutex<Connection>>,
    service: &TwoFactorService,
    username: &str,
    password: &str,
) -> Result<()> {
    println!("Authenticating...");

    let user = {
        let db = conn.lock().unwrap();
        match database::get_user_by_username(&db, username)? {
            Some(user) => user,
            // Same message as a bad password, so usernames can't be probed
            None => return Err(anyhow!("Invalid username or password")),
        }
    };

    if !verify_password(password, &user.password_hash)? {
        return Err(anyhow!("Invalid username or password"));
    }

    if user.two_factor.enabled {
        complete_two_factor(service, &user.id)?;
    }

    {
        let db = conn.lock().unwrap();
        database::update_last_login(&db, &user.id)?;
    }

    println!("\n✅ Logged in as {}", username);
    Ok(())
}

/// Run the verification-code exchange for an account with 2FA enabled
fn complete_two_factor(service: &TwoFactorService, user_id: &str) -> Result<()> {
    service
        .challenge(user_id)
        .map_err(|e| anyhow!("Failed to issue verification code: {}", e))?;

    println!("A verification code has been sent to your email address.");

    for attempt in 1..=CODE_PROMPT_ATTEMPTS {
        let code = read_line(format!("Code (attempt {}/{}): ", attempt, CODE_PROMPT_ATTEMPTS).as_str())?;

        match service.verify(user_id, &code, Utc::now()) {
            Ok(()) => return Ok(()),
            Err(TwoFactorError::CodeMismatch) => {
                println!("❌ Incorrect code.");
            }
            Err(TwoFactorError::Expired) => {
                return Err(anyhow!("The verification code has expired. Please log in again."));
            }
            Err(e) => return Err(anyhow!("Verification failed: {}", e)),
        }
    }

    Err(anyhow!("Too many incorrect codes. Please log in again."))
}
