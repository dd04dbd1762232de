//! Customer authentication service.
//!
//! Password login only. Registering with the email of a guest account
//! created at checkout claims that account and its orders.

mod error;

pub use error::AuthError;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use agora_commerce::db::RepositoryError;
use agora_commerce::db::UserRepository;
use agora_commerce::db::users::User;
use agora_commerce::password::{hash_password, validate_password, verify_password};
use agora_core::{Email, Phone};

const MAX_NAME_LENGTH: usize = 200;

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidPhone` or
    /// `AuthError::InvalidName` for bad input, `AuthError::WeakPassword` if
    /// the password doesn't meet requirements and
    /// `AuthError::UserAlreadyExists` if the email or phone is registered.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: &RegisterForm) -> Result<User, AuthError> {
        let name = validate_name(&form.name)?;
        let email = Email::parse(&form.email)?;
        let phone = form
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(Phone::parse)
            .transpose()?;
        validate_password(&form.password)?;

        let password_hash = hash_password(&form.password)?;

        let user = self
            .users
            .create_with_password(name, &email, phone.as_ref(), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Customer registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn login(&self, form: &LoginForm) -> Result<User, AuthError> {
        let email = Email::parse(&form.email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&form.password, &password_hash)?;

        Ok(user)
    }
}

fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("name is required".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName("name is too long".to_owned()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_commerce::password::PasswordError;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Ann ").ok(), Some("Ann"));
        assert!(matches!(validate_name("   "), Err(AuthError::InvalidName(_))));
        assert!(matches!(
            validate_name(&"a".repeat(201)),
            Err(AuthError::InvalidName(_))
        ));
    }

    #[test]
    fn test_password_errors_map_to_auth_errors() {
        assert!(matches!(
            AuthError::from(PasswordError::TooShort),
            AuthError::WeakPassword(_)
        ));
        assert!(matches!(
            AuthError::from(PasswordError::Mismatch),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from(PasswordError::Hash),
            AuthError::PasswordHash
        ));
    }
}
