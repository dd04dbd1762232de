//! Customer and admin user repositories.
//!
//! Customers are created either by registering or implicitly at checkout
//! (guest users). A guest who later registers with the same email or phone
//! claims the guest account, keeping its order history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use agora_core::{AdminRole, AdminUserId, Email, Phone, UserId};

use super::RepositoryError;

// =============================================================================
// Domain Types
// =============================================================================

/// A storefront customer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub name: String,
    /// Created at checkout without a password.
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An admin console user.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: Option<String>,
    phone: Option<String>,
    name: String,
    is_guest: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;
        let phone = row
            .phone
            .as_deref()
            .map(Phone::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid phone in database: {e}")))?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            phone,
            name: row.name,
            is_guest: row.is_guest,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    id: i32,
    email: String,
    name: String,
    role: AdminRole,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AdminUserRow> for AdminUser {
    type Error = RepositoryError;

    fn try_from(row: AdminUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: AdminUserId::new(row.id),
            email,
            name: row.name,
            role: row.role,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, phone, name, is_guest, created_at, updated_at";
const ADMIN_COLUMNS: &str = "id, email, name, role, active, created_at, updated_at";

// =============================================================================
// Customers
// =============================================================================

/// Repository for customer database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if stored contacts are invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if stored contacts are invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if stored contacts are invalid.
    pub async fn get_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE phone = $1"
        ))
        .bind(phone.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Register a customer with a password.
    ///
    /// A guest account with the same email is upgraded in place.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a registered user already has
    /// this email or phone.
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn create_with_password(
        &self,
        name: &str,
        email: &Email,
        phone: Option<&Phone>,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1 FOR UPDATE"
        ))
        .bind(email.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match existing {
            Some(row) if !row.is_guest => {
                return Err(RepositoryError::Conflict("email already exists".to_owned()));
            }
            Some(row) => sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE storefront.user
                 SET name = $2, phone = COALESCE($3, phone), password_hash = $4,
                     is_guest = FALSE, updated_at = NOW()
                 WHERE id = $1
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(row.id)
            .bind(name.trim())
            .bind(phone.map(Phone::as_str))
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(contact_conflict)?,
            None => sqlx::query_as::<_, UserRow>(&format!(
                "INSERT INTO storefront.user (email, phone, name, password_hash, is_guest)
                 VALUES ($1, $2, $3, $4, FALSE)
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(email.as_str())
            .bind(phone.map(Phone::as_str))
            .bind(name.trim())
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(contact_conflict)?,
        };

        tx.commit().await?;
        row.try_into()
    }

    /// Get a registered user and their password hash for login.
    ///
    /// Guest accounts have no password and are never returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if stored contacts are invalid.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, (i32, String)>(
            "SELECT id, password_hash FROM storefront.user
             WHERE email = $1 AND NOT is_guest AND password_hash IS NOT NULL",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some((id, hash)) = row else {
            return Ok(None);
        };
        Ok(self.get_by_id(UserId::new(id)).await?.map(|user| (user, hash)))
    }
}

/// Find the customer placing an order by email, then phone, creating a
/// guest account when neither is known. Runs on the caller's connection so
/// checkout can keep it inside its transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn find_or_create_customer(
    conn: &mut PgConnection,
    name: &str,
    email: &Email,
    phone: &Phone,
) -> Result<UserId, RepositoryError> {
    let existing = sqlx::query_scalar::<_, UserId>(
        "SELECT id FROM storefront.user
         WHERE email = $1 OR phone = $2
         ORDER BY (email = $1) DESC NULLS LAST, id
         LIMIT 1",
    )
    .bind(email.as_str())
    .bind(phone.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, UserId>(
        "INSERT INTO storefront.user (email, phone, name, is_guest)
         VALUES ($1, $2, $3, TRUE)
         RETURNING id",
    )
    .bind(email.as_str())
    .bind(phone.as_str())
    .bind(name.trim())
    .fetch_one(&mut *conn)
    .await
    .map_err(contact_conflict)?;

    tracing::info!(user_id = %id, "Guest user created at checkout");
    Ok(id)
}

fn contact_conflict(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict("email or phone already registered".to_owned());
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Admin Users
// =============================================================================

/// Repository for admin user database operations.
pub struct AdminUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminUserRepository<'a> {
    /// Create a new admin user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all admin users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(&self) -> Result<Vec<AdminUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin.admin_user ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get an admin user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin.admin_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Get an admin user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin.admin_user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Create an admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        role: AdminRole,
        password_hash: &str,
    ) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "INSERT INTO admin.admin_user (email, name, role, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING {ADMIN_COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(name.trim())
        .bind(role)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;
        row.try_into()
    }

    /// Get an active admin user and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(AdminUser, String)>, RepositoryError> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM admin.admin_user WHERE email = $1 AND active",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(hash) = row else {
            return Ok(None);
        };
        Ok(self.get_by_email(email).await?.map(|user| (user, hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: Option<&str>, phone: Option<&str>) -> UserRow {
        UserRow {
            id: 1,
            email: email.map(str::to_owned),
            phone: phone.map(str::to_owned),
            name: "Ann".to_owned(),
            is_guest: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_with_phone_only() {
        let user = User::try_from(row(None, Some("+79991234567")));
        assert!(matches!(user, Ok(User { email: None, phone: Some(_), .. })));
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let user = User::try_from(row(Some("not-an-email"), None));
        assert!(matches!(user, Err(RepositoryError::DataCorruption(_))));
    }
}
