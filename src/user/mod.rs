// User management module
// Registration, profile updates, and the two-factor authentication lifecycle.

pub mod profile;
pub mod registration;
pub mod store;
pub mod two_factor;
pub mod validation;

pub use profile::{change_password, get_user_profile, update_user_profile, UserProfile, UserProfileError};
pub use registration::{register_user, UserRegistrationError};
pub use store::{MemoryUserStore, SqliteUserStore, StoreError, UserStore};
pub use two_factor::{TwoFactorError, TwoFactorPolicy, TwoFactorService};
pub use validation::{validate_email, validate_password, validate_username, ValidationError};

/// Maximum accepted email address length
pub const MAX_EMAIL_LENGTH: usize = 255;

/// Email regex pattern for validation
pub const EMAIL_REGEX: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";
