use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use secure_profile_cli::database;
use secure_profile_cli::notify::ConsoleNotifier;
use secure_profile_cli::security::SqliteCredentialVerifier;
use secure_profile_cli::user::profile::{change_password, get_user_profile, update_user_profile};
use secure_profile_cli::user::registration::register_user;
use secure_profile_cli::user::store::SqliteUserStore;
use secure_profile_cli::user::two_factor::{TwoFactorError, TwoFactorPolicy, TwoFactorService};

fn setup() -> (TempDir, Arc<Mutex<rusqlite::Connection>>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let mut conn = database::open(db_path.to_str().unwrap()).unwrap();
    database::initialize(&mut conn).unwrap();

    (temp_dir, Arc::new(Mutex::new(conn)))
}

fn build_service(conn: &Arc<Mutex<rusqlite::Connection>>) -> TwoFactorService {
    TwoFactorService::new(
        Box::new(SqliteUserStore::new(Arc::clone(conn))),
        Box::new(SqliteCredentialVerifier::new(Arc::clone(conn))),
        Box::new(ConsoleNotifier),
        TwoFactorPolicy::default(),
    )
}

#[test]
fn two_factor_lifecycle_persists_through_sqlite() {
    let (_temp_dir, conn) = setup();
    let service = build_service(&conn);

    let user = {
        let db = conn.lock().unwrap();
        register_user(&db, "ingrid", "ingrid@example.com", "a fine password").unwrap()
    };

    // Password confirmation runs against the real stored hash
    assert_eq!(
        service.enable(&user.id, Some("not the password")).unwrap_err(),
        TwoFactorError::InvalidCredentials
    );
    service.enable(&user.id, Some("a fine password")).unwrap();

    let code = service.challenge(&user.id).unwrap();

    // The pending challenge is on disk, not just in memory
    {
        let db = conn.lock().unwrap();
        let stored = database::get_user_by_id(&db, &user.id).unwrap().unwrap();
        assert!(stored.two_factor.enabled);
        assert_eq!(stored.two_factor.code.as_deref(), Some(code.as_str()));
        let expires_at = stored.two_factor.expires_at.unwrap();
        assert!(expires_at > Utc::now() + Duration::minutes(9));
        assert!(expires_at < Utc::now() + Duration::minutes(11));
    }

    service.verify(&user.id, &code, Utc::now()).unwrap();

    {
        let db = conn.lock().unwrap();
        let stored = database::get_user_by_id(&db, &user.id).unwrap().unwrap();
        assert!(stored.two_factor.enabled);
        assert!(stored.two_factor.code.is_none());
        assert!(stored.two_factor.expires_at.is_none());
    }

    service.disable(&user.id, Some("a fine password")).unwrap();

    let db = conn.lock().unwrap();
    let stored = database::get_user_by_id(&db, &user.id).unwrap().unwrap();
    assert!(!stored.two_factor.enabled);
}

#[test]
fn profile_and_password_flows() {
    let (_temp_dir, conn) = setup();
    let service = build_service(&conn);

    let user = {
        let db = conn.lock().unwrap();
        register_user(&db, "jasper", "jasper@example.com", "a fine password").unwrap()
    };

    {
        let db = conn.lock().unwrap();
        update_user_profile(&db, &user.id, "jasper", "jasper@new.example.com").unwrap();
        let profile = get_user_profile(&db, &user.id).unwrap();
        assert_eq!(profile.email, "jasper@new.example.com");
        assert!(!profile.two_factor_enabled);

        change_password(&db, &user.id, "a fine password", "a better password", "a better password")
            .unwrap();
    }

    // 2FA password confirmation follows the password change
    assert_eq!(
        service.enable(&user.id, Some("a fine password")).unwrap_err(),
        TwoFactorError::InvalidCredentials
    );
    service.enable(&user.id, Some("a better password")).unwrap();

    let db = conn.lock().unwrap();
    let profile = get_user_profile(&db, &user.id).unwrap();
    assert!(profile.two_factor_enabled);
}
