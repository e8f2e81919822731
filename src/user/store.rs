use log::debug;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::database;
use crate::database::models::{TwoFactorState, User};

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence seam for user records, as seen by the two-factor service:
/// fetch a user, write back their two-factor state.
#[cfg_attr(test, mockall::automock)]
pub trait UserStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<User, StoreError>;
    fn update_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<(), StoreError>;
}

impl<T: UserStore> UserStore for Arc<T> {
    fn get(&self, user_id: &str) -> Result<User, StoreError> {
        (**self).get(user_id)
    }

    fn update_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<(), StoreError> {
        (**self).update_two_factor(user_id, state)
    }
}

/// User store backed by the SQLite users table
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl UserStore for SqliteUserStore {
    fn get(&self, user_id: &str) -> Result<User, StoreError> {
        let conn = self.conn.lock().unwrap();
        database::get_user_by_id(&conn, user_id)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or(StoreError::NotFound)
    }

    fn update_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let touched = database::update_two_factor(&conn, user_id, state)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if touched == 0 {
            return Err(StoreError::NotFound);
        }

        debug!("Updated two-factor state for user {}", user_id);
        Ok(())
    }
}

/// In-memory user store, used by tests and useful as a reference
/// implementation of the trait contract
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id.clone(), user);
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, user_id: &str) -> Result<User, StoreError> {
        self.users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn update_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        user.two_factor = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            "carol".to_string(),
            "carol@example.com".to_string(),
            "hash".to_string(),
            "salt".to_string(),
        )
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryUserStore::new();
        let user = sample_user();
        let id = user.id.clone();
        store.insert(user);

        let mut state = store.get(&id).unwrap().two_factor;
        state.enabled = true;
        store.update_two_factor(&id, &state).unwrap();

        assert!(store.get(&id).unwrap().two_factor.enabled);
        assert!(matches!(store.get("missing"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_sqlite_store_reports_missing_user() {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::database::schema::create_schema(&mut conn).unwrap();
        let store = SqliteUserStore::new(Arc::new(Mutex::new(conn)));

        assert!(matches!(store.get("missing"), Err(StoreError::NotFound)));
        assert!(matches!(
            store.update_two_factor("missing", &TwoFactorState::disabled()),
            Err(StoreError::NotFound)
        ));
    }
}
