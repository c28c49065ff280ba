//! Username/password checks for `login`
//!
//! Passwords are stored as Argon2id PHC strings on the user record.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::db::schemas::UserDoc;
use crate::types::HdbError;

/// Hash a password for storage on a user record
pub fn hash_password(password: &str) -> Result<String, HdbError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HdbError::Auth(format!("Failed to hash password: {e}")))
}

/// True only for an enabled user whose stored hash matches `password`.
/// A corrupt stored hash counts as a mismatch.
pub fn password_matches(user: &UserDoc, password: &str) -> bool {
    if !user.enabled {
        return false;
    }

    match PasswordHash::new(&user.password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
