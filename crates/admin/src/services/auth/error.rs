//! Admin authentication error types.

use thiserror::Error;

use agora_commerce::db::RepositoryError;
use agora_commerce::password::PasswordError;

/// Errors that can occur during admin authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] agora_core::EmailError),

    /// Name missing or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Wrong password, unknown email or deactivated account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password too weak.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort | PasswordError::Blank => Self::WeakPassword(e.to_string()),
            PasswordError::Mismatch => Self::InvalidCredentials,
            PasswordError::Hash => Self::PasswordHash,
        }
    }
}
