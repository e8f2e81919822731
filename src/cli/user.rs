use anyhow::{Result, anyhow};
use log::error;

use crate::cli::utils::read_password;
use crate::config;
use crate::user::two_factor::{TwoFactorError, TwoFactorService};

/// Handle enabling two-factor authentication
pub fn enable_2fa(service: &TwoFactorService, user_id: &str) -> Result<()> {
    println!("Enabling two-factor authentication...");
    println!("At every login you will receive a verification code by email.");

    let password = confirm_password_if_required()?;

    match service.enable(user_id, password.as_deref()) {
        Ok(()) => {
            println!("\n✅ Two-factor authentication has been enabled for your account.");
            Ok(())
        }
        Err(TwoFactorError::InvalidCredentials) => {
            println!("\n❌ The password you entered is incorrect.");
            Err(anyhow!("Invalid password"))
        }
        Err(e) => {
            error!("Failed to enable 2FA: {}", e);
            println!("\n❌ Failed to enable two-factor authentication: {}", e);
            Err(e.into())
        }
    }
}

/// Handle disabling two-factor authentication
pub fn disable_2fa(service: &TwoFactorService, user_id: &str) -> Result<()> {
    println!("Disabling two-factor authentication...");

    let password = confirm_password_if_required()?;

    match service.disable(user_id, password.as_deref()) {
        Ok(()) => {
            println!("\n✅ Two-factor authentication has been disabled for your account.");
            Ok(())
        }
        Err(TwoFactorError::InvalidCredentials) => {
            println!("\n❌ The password you entered is incorrect.");
            Err(anyhow!("Invalid password"))
        }
        Err(e) => {
            error!("Failed to disable 2FA: {}", e);
            println!("\n❌ Failed to disable two-factor authentication: {}", e);
            Err(e.into())
        }
    }
}

fn confirm_password_if_required() -> Result<Option<String>> {
    if !config::get_config().security.confirm_password {
        return Ok(None);
    }

    let password = read_password("Current password: ")?;
    Ok(Some(password))
}
