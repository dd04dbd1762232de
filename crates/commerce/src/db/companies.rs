//! Tenant repositories: companies and their shops.
//!
//! A company is the legal tenant; each company runs one or more shops, and
//! every stock/price record (shop product) belongs to a shop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use agora_core::{CompanyId, Email, Phone, ShopId, Slug};

use super::{RepositoryError, map_write_error};

/// A tenant company.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub slug: Slug,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or updating a company.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub slug: Slug,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
}

/// A shop owned by a company.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Shop {
    pub id: ShopId,
    pub company_id: CompanyId,
    pub name: String,
    pub slug: Slug,
    pub city: String,
    pub address: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or updating a shop.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopInput {
    pub name: String,
    pub slug: Slug,
    pub city: String,
    pub address: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
}

const COMPANY_COLUMNS: &str = "id, name, slug, email, phone, created_at, updated_at";
const SHOP_COLUMNS: &str =
    "id, company_id, name, slug, city, address, email, phone, created_at, updated_at";

/// Repository for company database operations.
pub struct CompanyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CompanyRepository<'a> {
    /// Create a new company repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all companies ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Company>, RepositoryError> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM catalog.company ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(companies)
    }

    /// Get a company by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no company has this ID.
    pub async fn get(&self, id: CompanyId) -> Result<Company, RepositoryError> {
        sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM catalog.company WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create(&self, input: &CompanyInput) -> Result<Company, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Company>(&format!(
            "INSERT INTO catalog.company (name, slug, email, phone)
             VALUES ($1, $2, $3, $4)
             RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(name)
        .bind(&input.slug)
        .bind(input.email.as_ref())
        .bind(input.phone.as_ref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "company slug already exists"))
    }

    /// Update a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the company does not exist and
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CompanyId,
        input: &CompanyInput,
    ) -> Result<Company, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Company>(&format!(
            "UPDATE catalog.company
             SET name = $2, slug = $3, email = $4, phone = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(&input.slug)
        .bind(input.email.as_ref())
        .bind(input.phone.as_ref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "company slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a company that has no shops left.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` while the company still owns shops.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CompanyId) -> Result<(), RepositoryError> {
        let (shops,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM catalog.shop WHERE company_id = $1")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        if shops > 0 {
            return Err(RepositoryError::Invalid(format!(
                "company still has {shops} shop(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM catalog.company WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Repository for shop database operations.
pub struct ShopRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopRepository<'a> {
    /// Create a new shop repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the shops of a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_company(&self, company_id: CompanyId) -> Result<Vec<Shop>, RepositoryError> {
        let shops = sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM catalog.shop WHERE company_id = $1 ORDER BY name"
        ))
        .bind(company_id)
        .fetch_all(self.pool)
        .await?;
        Ok(shops)
    }

    /// Get a shop by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no shop has this ID.
    pub async fn get(&self, id: ShopId) -> Result<Shop, RepositoryError> {
        sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM catalog.shop WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Get a shop by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no shop has this slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Shop, RepositoryError> {
        sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM catalog.shop WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Get shops by ID, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ShopId]) -> Result<Vec<Shop>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ShopId::as_i32).collect();
        let shops = sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM catalog.shop WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(shops)
    }

    /// Create a shop for a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or the
    /// company does not exist.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create(
        &self,
        company_id: CompanyId,
        input: &ShopInput,
    ) -> Result<Shop, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Shop>(&format!(
            "INSERT INTO catalog.shop (company_id, name, slug, city, address, email, phone)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SHOP_COLUMNS}"
        ))
        .bind(company_id)
        .bind(name)
        .bind(&input.slug)
        .bind(input.city.trim())
        .bind(input.address.trim())
        .bind(input.email.as_ref())
        .bind(input.phone.as_ref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "shop slug already exists"))
    }

    /// Update a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the shop does not exist.
    pub async fn update(&self, id: ShopId, input: &ShopInput) -> Result<Shop, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Shop>(&format!(
            "UPDATE catalog.shop
             SET name = $2, slug = $3, city = $4, address = $5, email = $6, phone = $7,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {SHOP_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(&input.slug)
        .bind(input.city.trim())
        .bind(input.address.trim())
        .bind(input.email.as_ref())
        .bind(input.phone.as_ref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "shop slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a shop together with its shop products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if orders still reference the shop.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ShopId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog.shop WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_write_error(e, "shop"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Trim a display name and reject empty ones.
pub(crate) fn required_name(name: &str) -> Result<&str, RepositoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RepositoryError::Invalid("name cannot be empty".to_owned()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_name_trims() {
        assert!(matches!(required_name("  Shop  "), Ok("Shop")));
        assert!(matches!(
            required_name("   "),
            Err(RepositoryError::Invalid(_))
        ));
    }
}
