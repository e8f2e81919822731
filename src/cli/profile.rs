use anyhow::Result;
use log::error;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::cli::utils::{read_line, read_password};
use crate::user::profile::{change_password, get_user_profile, update_user_profile};

/// Print a user's profile
pub fn show(conn: &Arc<Mutex<Connection>>, user_id: &str) -> Result<()> {
    let db = conn.lock().unwrap();
    let profile = get_user_profile(&db, user_id)?;

    println!("Username:    {}", profile.username);
    println!("Email:       {}", profile.email);
    println!("2FA enabled: {}", if profile.two_factor_enabled { "yes" } else { "no" });
    match profile.last_login {
        Some(at) => println!("Last login:  {}", at),
        None => println!("Last login:  never"),
    }
    println!("Created:     {}", profile.created_at);

    Ok(())
}

/// Interactively update username and email
pub fn update(conn: &Arc<Mutex<Connection>>, user_id: &str) -> Result<()> {
    let current = {
        let db = conn.lock().unwrap();
        get_user_profile(&db, user_id)?
    };

    println!("Press enter to keep the current value.");
    let username = prompt_with_default("Username", &current.username)?;
    let email = prompt_with_default("Email", &current.email)?;

    let db = conn.lock().unwrap();
    match update_user_profile(&db, user_id, &username, &email) {
        Ok(()) => {
            println!("\n✅ Profile updated successfully.");
            Ok(())
        }
        Err(e) => {
            error!("Profile update failed: {}", e);
            println!("\n❌ Profile update failed: {}", e);
            Err(e.into())
        }
    }
}

/// Interactively change the password
pub fn update_password(conn: &Arc<Mutex<Connection>>, user_id: &str) -> Result<()> {
    let current = read_password("Current password: ")?;
    let new = read_password("New password: ")?;
    let confirmation = read_password("Confirm new password: ")?;

    let db = conn.lock().unwrap();
    match change_password(&db, user_id, &current, &new, &confirmation) {
        Ok(()) => {
            println!("\n✅ Password updated successfully.");
            Ok(())
        }
        Err(e) => {
            error!("Password change failed: {}", e);
            println!("\n❌ Password change failed: {}", e);
            Err(e.into())
        }
    }
}

fn prompt_with_default(label: &str, default: &str) -> Result<String> {
    let value = read_line(&format!("{} [{}]: ", label, default))?;
    if value.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(value)
    }
}
