//! Database operations for the shared Agora `PostgreSQL` database.
//!
//! ## Schemas
//!
//! - `catalog` - companies, shops, options, attributes, rubrics, products,
//!   shop products, variant connections
//! - `sales` - carts, orders, order products, order log
//! - `storefront` - customers and storefront sessions
//! - `admin` - admin users and admin sessions
//!
//! # Migrations
//!
//! Migrations are stored in `migrations/` at the workspace root and run via:
//! ```bash
//! cargo run -p agora-cli -- migrate
//! ```

pub mod attributes;
pub mod carts;
pub mod companies;
pub mod connections;
pub mod options;
pub mod orders;
pub mod products;
pub mod rubrics;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use attributes::AttributesRepository;
pub use carts::CartRepository;
pub use companies::{CompanyRepository, ShopRepository};
pub use connections::ConnectionRepository;
pub use options::OptionsRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use rubrics::RubricRepository;
pub use users::{AdminUserRepository, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The write is not allowed by a domain rule.
    #[error("invalid operation: {0}")]
    Invalid(String),
}

/// Default page size for admin listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map unique and foreign-key violations to [`RepositoryError::Conflict`].
///
/// `what` names the conflicting value in the error message, e.g.
/// `"slug already exists"`.
pub(crate) fn map_write_error(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(what.to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict(format!(
                "referenced record is missing or still in use ({})",
                db_err.constraint().unwrap_or("foreign key")
            ));
        }
        if db_err.is_check_violation() {
            return RepositoryError::Invalid(format!(
                "check failed ({})",
                db_err.constraint().unwrap_or("check")
            ));
        }
    }
    RepositoryError::Database(e)
}

/// Clamp a 1-based page number and return the SQL offset for it.
#[must_use]
pub fn page_offset(page: u32, page_size: i64) -> i64 {
    i64::from(page.max(1) - 1) * page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0, 30), 0);
        assert_eq!(page_offset(1, 30), 0);
        assert_eq!(page_offset(3, 30), 60);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = map_write_error(sqlx::Error::RowNotFound, "slug already exists");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
