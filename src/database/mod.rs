use anyhow::{Result, Context};
use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

pub mod schema;
pub mod models;

use models::{TwoFactorState, User};

/// Open (and create, if necessary) the database at the given path
pub fn open(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let conn = Connection::open(path).context(format!("Failed to open database at {}", path))?;
    Ok(conn)
}

/// Initialize the database schema
pub fn initialize(conn: &mut Connection) -> Result<()> {
    schema::create_schema(conn)?;
    info!("Database initialized");
    Ok(())
}

fn map_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        salt: row.get(4)?,
        two_factor: TwoFactorState {
            enabled: row.get::<_, i64>(5)? != 0,
            code: row.get(6)?,
            expires_at: row.get(7)?,
        },
        last_login: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const USER_COLUMNS: &str = "id, username, email, password_hash, salt, \
     two_factor_enabled, two_factor_code, two_factor_expires_at, \
     last_login, created_at, updated_at";

/// Insert a new user record
pub fn insert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, salt,
            two_factor_enabled, two_factor_code, two_factor_expires_at,
            last_login, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.id,
            user.username,
            user.email,
            user.password_hash,
            user.salt,
            user.two_factor.enabled as i64,
            user.two_factor.code,
            user.two_factor.expires_at,
            user.last_login,
            user.created_at,
            user.updated_at,
        ],
    ).context("Failed to insert user")?;

    debug!("Inserted user {}", user.id);
    Ok(())
}

/// Fetch a user by ID
pub fn get_user_by_id(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        map_user_row,
    )
    .optional()
    .context("Failed to query user by id")
}

/// Fetch a user by username
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        params![username],
        map_user_row,
    )
    .optional()
    .context("Failed to query user by username")
}

/// Check whether a username is already taken
pub fn username_in_use(conn: &Connection, username: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    ).context("Failed to check username")?;

    Ok(count > 0)
}

/// Check whether an email address is already taken, optionally ignoring one
/// user (so a user can keep their own address on profile update)
pub fn email_in_use(conn: &Connection, email: &str, exclude_user_id: Option<&str>) -> Result<bool> {
    let count: i64 = match exclude_user_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
            params![email, id],
            |row| row.get(0),
        ),
        None => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        ),
    }.context("Failed to check email")?;

    Ok(count > 0)
}

/// Update a user's username and email
pub fn update_profile_fields(conn: &Connection, user_id: &str, username: &str, email: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET username = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
        params![username, email, Utc::now(), user_id],
    ).context("Failed to update profile")?;

    anyhow::ensure!(updated == 1, "No user with id {}", user_id);
    Ok(())
}

/// Replace a user's password hash and salt
pub fn update_password_hash(conn: &Connection, user_id: &str, password_hash: &str, salt: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET password_hash = ?1, salt = ?2, updated_at = ?3 WHERE id = ?4",
        params![password_hash, salt, Utc::now(), user_id],
    ).context("Failed to update password")?;

    anyhow::ensure!(updated == 1, "No user with id {}", user_id);
    Ok(())
}

/// Record a successful login
pub fn update_last_login(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), user_id],
    ).context("Failed to update last login")?;

    Ok(())
}

/// Write a user's two-factor state; returns the number of rows touched so the
/// caller can distinguish a missing user
pub fn update_two_factor(conn: &Connection, user_id: &str, state: &TwoFactorState) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE users SET two_factor_enabled = ?1, two_factor_code = ?2,
            two_factor_expires_at = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            state.enabled as i64,
            state.code,
            state.expires_at,
            Utc::now(),
            user_id,
        ],
    ).context("Failed to update two-factor state")?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::create_schema(&mut conn).unwrap();
        conn
    }

    fn sample_user() -> User {
        User::new(
            "bob".to_string(),
            "bob@example.com".to_string(),
            "hash".to_string(),
            "salt".to_string(),
        )
    }

    #[test]
    fn test_insert_and_fetch_user() {
        let conn = setup();
        let user = sample_user();
        insert_user(&conn, &user).unwrap();

        let fetched = get_user_by_username(&conn, "bob").unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.email, "bob@example.com");
        assert!(!fetched.two_factor.enabled);

        assert!(get_user_by_username(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_email_in_use_excludes_self() {
        let conn = setup();
        let user = sample_user();
        insert_user(&conn, &user).unwrap();

        assert!(email_in_use(&conn, "bob@example.com", None).unwrap());
        assert!(!email_in_use(&conn, "bob@example.com", Some(&user.id)).unwrap());
        assert!(!email_in_use(&conn, "other@example.com", None).unwrap());
    }

    #[test]
    fn test_two_factor_state_round_trip() {
        let conn = setup();
        let user = sample_user();
        insert_user(&conn, &user).unwrap();

        let mut state = TwoFactorState::disabled();
        state.enabled = true;
        state.begin_challenge("042133".to_string(), Utc::now() + Duration::minutes(10));

        let touched = update_two_factor(&conn, &user.id, &state).unwrap();
        assert_eq!(touched, 1);

        let fetched = get_user_by_id(&conn, &user.id).unwrap().unwrap();
        assert!(fetched.two_factor.enabled);
        assert_eq!(fetched.two_factor.code.as_deref(), Some("042133"));
        assert!(fetched.two_factor.expires_at.is_some());

        let touched = update_two_factor(&conn, "missing", &state).unwrap();
        assert_eq!(touched, 0);
    }
}
