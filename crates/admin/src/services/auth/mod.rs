//! Admin authentication service.
//!
//! Email and password login against `admin.admin_user`. Deactivated admins
//! cannot log in. New admins are created by super admins or the CLI.

mod error;

pub use error::AuthError;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use agora_commerce::db::AdminUserRepository;
use agora_commerce::db::users::AdminUser;
use agora_commerce::password::{hash_password, validate_password, verify_password};
use agora_core::{AdminRole, Email};

const MAX_NAME_LENGTH: usize = 200;

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// New admin user form.
#[derive(Debug, Deserialize)]
pub struct NewAdminForm {
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    pub password: String,
}

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    users: AdminUserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: AdminUserRepository::new(pool),
        }
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email, a
    /// deactivated account or a wrong password.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn login(&self, form: &LoginForm) -> Result<AdminUser, AuthError> {
        let email = Email::parse(&form.email).map_err(|_| AuthError::InvalidCredentials)?;

        let (admin, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&form.password, &password_hash)?;

        tracing::info!(admin_id = %admin.id, role = %admin.role, "Admin logged in");
        Ok(admin)
    }

    /// Create a new admin user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidName` or
    /// `AuthError::WeakPassword` for bad input and
    /// `AuthError::Repository(Conflict)` if the email is taken.
    #[instrument(skip(self, form), fields(email = %form.email, role = %form.role))]
    pub async fn create_admin(&self, form: &NewAdminForm) -> Result<AdminUser, AuthError> {
        let email = Email::parse(&form.email)?;
        let name = validate_name(&form.name)?;
        validate_password(&form.password)?;
        let password_hash = hash_password(&form.password)?;

        let admin = self
            .users
            .create(&email, name, form.role, &password_hash)
            .await?;

        tracing::info!(admin_id = %admin.id, "Admin user created");
        Ok(admin)
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
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Vera ").unwrap(), "Vera");
        assert!(matches!(validate_name("   "), Err(AuthError::InvalidName(_))));
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_password_errors_map() {
        assert!(matches!(
            AuthError::from(agora_commerce::password::PasswordError::Mismatch),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from(agora_commerce::password::PasswordError::TooShort),
            AuthError::WeakPassword(_)
        ));
    }

    #[test]
    fn test_new_admin_form_role() {
        let form: NewAdminForm = serde_json::from_str(
            r#"{"email": "ed@agora.test", "name": "Ed", "role": "content_manager", "password": "longenough"}"#,
        )
        .unwrap();
        assert_eq!(form.role, AdminRole::ContentManager);
        assert!(serde_json::from_str::<NewAdminForm>(
            r#"{"email": "ed@agora.test", "name": "Ed", "role": "owner", "password": "longenough"}"#,
        )
        .is_err());
    }
}
