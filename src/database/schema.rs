use anyhow::{Result, Context};
use log::debug;
use rusqlite::Connection;

/// Create the database schema
pub fn create_schema(conn: &mut Connection) -> Result<()> {
    debug!("Creating database schema");

    // Use a transaction so the schema is created completely or not at all
    let tx = conn.transaction().context("Failed to start transaction for schema creation")?;

    // Create users table
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            two_factor_enabled INTEGER NOT NULL DEFAULT 0,
            two_factor_code TEXT,
            two_factor_expires_at TEXT,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    ).context("Failed to create users table")?;

    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_username ON users (username)",
        [],
    ).context("Failed to create username index")?;

    tx.commit().context("Failed to commit schema creation")?;

    debug!("Database schema created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_schema_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_schema(&mut conn).unwrap();
        create_schema(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
