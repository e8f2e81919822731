use anyhow::{Result, anyhow};
use chrono::Duration;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Env;
use log::error;
use rusqlite::Connection;
use std::process;
use std::sync::{Arc, Mutex};

use secure_profile_cli::cli;
use secure_profile_cli::config;
use secure_profile_cli::database;
use secure_profile_cli::database::models::User;
use secure_profile_cli::notify::{CodeNotifier, ConsoleNotifier, SmtpNotifier};
use secure_profile_cli::security::SqliteCredentialVerifier;
use secure_profile_cli::user::registration::register_user;
use secure_profile_cli::user::store::SqliteUserStore;
use secure_profile_cli::user::two_factor::{TwoFactorPolicy, TwoFactorService};

/// Secure Profile CLI - profile management with email two-factor authentication
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Sets the configuration file
    #[clap(short, long, value_name = "FILE", default_value = "config.toml")]
    config: String,

    /// Turn debugging information on
    #[clap(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init {},

    /// Register a new user
    Register {
        /// Username
        #[clap(short, long)]
        username: String,

        /// Email address
        #[clap(short, long)]
        email: String,
    },

    /// Login to the system
    Login {
        /// Username
        #[clap(short, long)]
        username: String,
    },

    /// Profile management commands
    Profile {
        #[clap(subcommand)]
        command: ProfileCommands,
    },

    /// Two-factor authentication commands
    TwoFactor {
        #[clap(subcommand)]
        command: TwoFactorCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show a user's profile
    Show {
        /// Username
        #[clap(short, long)]
        username: String,
    },

    /// Update username and email
    Update {
        /// Username
        #[clap(short, long)]
        username: String,
    },

    /// Change the account password
    ChangePassword {
        /// Username
        #[clap(short, long)]
        username: String,
    },
}

#[derive(Subcommand)]
enum TwoFactorCommands {
    /// Enable email two-factor authentication
    Enable {
        /// Username
        #[clap(short, long)]
        username: String,
    },

    /// Disable email two-factor authentication
    Disable {
        /// Username
        #[clap(short, long)]
        username: String,
    },
}

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let level = match args.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = config::load_config(&args.config) {
        eprintln!("Failed to load configuration: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args.command) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let cfg = config::get_config();
    let mut conn = database::open(&cfg.database.path)?;

    if let Commands::Init {} = command {
        database::initialize(&mut conn)?;
        println!("✅ Database initialized at {}", cfg.database.path);
        return Ok(());
    }

    let conn = Arc::new(Mutex::new(conn));
    let service = build_service(Arc::clone(&conn));

    match command {
        Commands::Init {} => unreachable!("handled above"),

        Commands::Register { username, email } => {
            let password = cli::utils::read_password("Password: ")?;
            let confirmation = cli::utils::read_password("Confirm password: ")?;
            if password != confirmation {
                return Err(anyhow!("Password confirmation does not match"));
            }

            let db = conn.lock().unwrap();
            let user = register_user(&db, &username, &email, &password)?;
            println!("✅ Registered user {} ({})", user.username, user.id);
            Ok(())
        }

        Commands::Login { username } => cli::auth::login(&conn, &service, &username),

        Commands::Profile { command } => match command {
            ProfileCommands::Show { username } => {
                let user = require_user(&conn, &username)?;
                cli::profile::show(&conn, &user.id)
            }
            ProfileCommands::Update { username } => {
                let user = require_user(&conn, &username)?;
                cli::profile::update(&conn, &user.id)
            }
            ProfileCommands::ChangePassword { username } => {
                let user = require_user(&conn, &username)?;
                cli::profile::update_password(&conn, &user.id)
            }
        },

        Commands::TwoFactor { command } => match command {
            TwoFactorCommands::Enable { username } => {
                let user = require_user(&conn, &username)?;
                cli::user::enable_2fa(&service, &user.id)
            }
            TwoFactorCommands::Disable { username } => {
                let user = require_user(&conn, &username)?;
                cli::user::disable_2fa(&service, &user.id)
            }
        },
    }
}

fn build_service(conn: Arc<Mutex<Connection>>) -> TwoFactorService {
    let cfg = config::get_config();

    let notifier: Box<dyn CodeNotifier> = if cfg.smtp.enabled {
        Box::new(SmtpNotifier::new(&cfg.smtp, cfg.security.code_ttl_minutes))
    } else {
        Box::new(ConsoleNotifier)
    };

    TwoFactorService::new(
        Box::new(SqliteUserStore::new(Arc::clone(&conn))),
        Box::new(SqliteCredentialVerifier::new(conn)),
        notifier,
        TwoFactorPolicy {
            confirm_password: cfg.security.confirm_password,
            code_ttl: Duration::minutes(cfg.security.code_ttl_minutes as i64),
        },
    )
}

fn require_user(conn: &Arc<Mutex<Connection>>, username: &str) -> Result<User> {
    let db = conn.lock().unwrap();
    database::get_user_by_username(&db, username)?
        .ok_or_else(|| anyhow!("No such user: {}", username))
}
