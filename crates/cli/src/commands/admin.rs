//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! AGORA_ADMIN_PASSWORD='...' agora admin create -e admin@example.com -n "Admin Name" -r super_admin
//! ```
//!
//! Without `AGORA_ADMIN_PASSWORD` a random password is generated and
//! printed once.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `AGORA_ADMIN_PASSWORD` - Password for the new admin (optional)

use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use agora_commerce::db::{AdminUserRepository, RepositoryError};
use agora_commerce::password::{PasswordError, hash_password, validate_password};
use agora_core::{AdminRole, AdminUserId, Email};

use super::{ConnectError, connect};

const GENERATED_PASSWORD_LENGTH: usize = 20;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, content_manager, viewer")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Blank display name.
    #[error("Name must not be empty")]
    InvalidName,

    /// Password rejected or could not be hashed.
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    /// User already exists.
    #[error("Admin user already exists with email: {0}")]
    UserExists(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create a new admin user.
///
/// # Errors
///
/// Returns an error for an invalid role, email or password, a duplicate
/// email, or a database failure.
pub async fn create_user(email: &str, name: &str, role: &str) -> Result<AdminUserId, AdminError> {
    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    if name.trim().is_empty() {
        return Err(AdminError::InvalidName);
    }

    let (password, generated) = match std::env::var("AGORA_ADMIN_PASSWORD") {
        Ok(password) => (password, false),
        Err(_) => (generate_password(), true),
    };
    validate_password(&password)?;
    let password_hash = hash_password(&password)?;

    let pool = connect().await?;

    tracing::info!("Creating admin user: {} ({})", email, role);
    let admin = AdminUserRepository::new(&pool)
        .create(&email, name, role, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        admin.id,
        admin.email,
        admin.role
    );

    if generated {
        #[allow(clippy::print_stdout)]
        {
            println!("Generated password (shown once): {password}");
        }
    }

    Ok(admin.id)
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password_passes_validation() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(validate_password(&password).is_ok());
        assert_ne!(password, generate_password());
    }

    #[tokio::test]
    async fn test_invalid_role_is_rejected_before_connecting() {
        let err = create_user("a@example.com", "A", "owner").await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidRole(_)));
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected_before_connecting() {
        let err = create_user("not-an-email", "A", "admin").await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidEmail(_)));
    }
}
