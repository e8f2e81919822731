// Security primitives: password hashing and verification code generation.

pub mod otp;
pub mod password;

pub use otp::generate_code;
pub use password::{
    hash_password, verify_password, CredentialVerifier, SqliteCredentialVerifier,
};

#[cfg(test)]
pub use password::MockCredentialVerifier;
