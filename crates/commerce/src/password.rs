//! Argon2id password hashing shared by customers and admins.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("password must not be only whitespace")]
    Blank,

    /// Wrong password or a stored hash that cannot be parsed.
    #[error("password does not match")]
    Mismatch,

    #[error("password hashing failed")]
    Hash,
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `PasswordError::TooShort` or `PasswordError::Blank`.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if password.trim().is_empty() {
        return Err(PasswordError::Blank);
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `PasswordError::Hash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `PasswordError::Mismatch` if the password is wrong.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::Mismatch)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::Mismatch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert_eq!(
            verify_password("wrong horse", &hash),
            Err(PasswordError::Mismatch)
        );
    }

    #[test]
    fn test_garbage_hash_is_a_mismatch() {
        assert_eq!(
            verify_password("whatever", "not-a-hash"),
            Err(PasswordError::Mismatch)
        );
    }

    #[test]
    fn test_validate_password() {
        assert_eq!(validate_password("short"), Err(PasswordError::TooShort));
        assert_eq!(validate_password("          "), Err(PasswordError::Blank));
        assert!(validate_password("long enough").is_ok());
    }
}
