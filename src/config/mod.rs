use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::{Result, Context};
use lazy_static::lazy_static;
use std::sync::RwLock;

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Security configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Minimum password length
    pub min_password_length: usize,
    /// Argon2id memory cost in kibibytes
    pub password_memory_cost: u32,
    /// Whether enabling/disabling two-factor authentication requires
    /// re-entering the current password
    pub confirm_password: bool,
    /// Validity window for emailed verification codes, in minutes
    pub code_ttl_minutes: u32,
    /// Optional secret mixed into password hashes before Argon2. Not stored
    /// in the database; losing it invalidates every stored hash.
    pub password_pepper: Option<String>,
}

/// SMTP configuration for verification code delivery
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmtpConfig {
    /// Whether to deliver codes over SMTP; when false, codes are printed to
    /// the local terminal instead
    pub enabled: bool,
    /// SMTP relay hostname
    pub host: String,
    /// SMTP username
    pub username: String,
    /// SMTP password
    pub password: String,
    /// Sender address for verification mail
    pub from_address: String,
}

/// Global application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Application version
    pub version: String,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// SMTP configuration
    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Secure Profile CLI".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseConfig {
                path: "data/profiles.db".to_string(),
            },
            security: SecurityConfig {
                min_password_length: 8,
                password_memory_cost: 65536,
                confirm_password: true,
                code_ttl_minutes: 10,
                password_pepper: None,
            },
            smtp: SmtpConfig {
                enabled: false,
                host: "smtp.example.com".to_string(),
                username: String::new(),
                password: String::new(),
                from_address: "no-reply@example.com".to_string(),
            },
        }
    }
}

// Global configuration instance
lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

/// Load configuration from file
pub fn load_config(path: &str) -> Result<()> {
    // Check if file exists
    if !Path::new(path).exists() {
        // If not, create default config and save it
        let default_config = Config::default();
        save_config(path, &default_config)?;
        *CONFIG.write().unwrap() = default_config;
        return Ok(());
    }

    // Read the config file
    let mut file = File::open(path).context(format!("Failed to open config file: {}", path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).context("Failed to read config file")?;

    // Parse the config file
    let config: Config = match path.ends_with(".toml") {
        true => toml::from_str(&contents).context("Failed to parse TOML config")?,
        false => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
    };

    // Update the global config
    *CONFIG.write().unwrap() = config;

    Ok(())
}

/// Save configuration to file
pub fn save_config(path: &str, config: &Config) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    // Serialize the config
    let contents = match path.ends_with(".toml") {
        true => toml::to_string_pretty(config).context("Failed to serialize TOML config")?,
        false => serde_json::to_string_pretty(config).context("Failed to serialize JSON config")?,
    };

    std::fs::write(path, contents).context(format!("Failed to write config file: {}", path))?;

    Ok(())
}

/// Get a copy of the current configuration
pub fn get_config() -> Config {
    CONFIG.read().unwrap().clone()
}
