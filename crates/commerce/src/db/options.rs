//! Options groups and their options.
//!
//! An options group is a reusable list of values (colours, grape varieties,
//! countries). Select-type attributes point at one group, and product
//! attribute values store option IDs from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use agora_core::{OptionId, OptionsGroupId, OptionsGroupVariant, Slug};

use super::companies::required_name;
use super::{RepositoryError, map_write_error};

/// A group of options.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OptionsGroup {
    pub id: OptionsGroupId,
    pub name: String,
    pub variant: OptionsGroupVariant,
    pub created_at: DateTime<Utc>,
}

/// A single selectable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CatalogOption {
    pub id: OptionId,
    pub options_group_id: OptionsGroupId,
    pub name: String,
    pub slug: Slug,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub priority: i32,
}

/// An options group with its options, ordered by priority then name.
#[derive(Debug, Clone, Serialize)]
pub struct OptionsGroupWithOptions {
    #[serde(flatten)]
    pub group: OptionsGroup,
    pub options: Vec<CatalogOption>,
}

/// Fields for creating or updating an options group.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsGroupInput {
    pub name: String,
    #[serde(default)]
    pub variant: OptionsGroupVariant,
}

/// Fields for creating or updating an option.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionInput {
    pub name: String,
    /// Generated from the name when absent.
    pub slug: Option<Slug>,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

impl OptionInput {
    /// The explicit slug, or one derived from the name with `_` separators.
    ///
    /// Option slugs appear as filter values, so they never contain `-`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if no usable slug can be built.
    pub fn resolved_slug(&self) -> Result<Slug, RepositoryError> {
        let slug = match &self.slug {
            Some(slug) => slug.clone(),
            None => Slug::from_name(&self.name, '_')
                .map_err(|e| RepositoryError::Invalid(format!("option slug: {e}")))?,
        };
        if !slug.is_key() {
            return Err(RepositoryError::Invalid(
                "option slug cannot contain '-'".to_owned(),
            ));
        }
        Ok(slug)
    }
}

const GROUP_COLUMNS: &str = "id, name, variant, created_at";
const OPTION_COLUMNS: &str = "id, options_group_id, name, slug, color, icon, priority";

/// Repository for options groups and options.
pub struct OptionsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OptionsRepository<'a> {
    /// Create a new options repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all options groups.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_groups(&self) -> Result<Vec<OptionsGroup>, RepositoryError> {
        let groups = sqlx::query_as::<_, OptionsGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM catalog.options_group ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(groups)
    }

    /// Get a group with its options.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the group does not exist.
    pub async fn get_group(
        &self,
        id: OptionsGroupId,
    ) -> Result<OptionsGroupWithOptions, RepositoryError> {
        let group = sqlx::query_as::<_, OptionsGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM catalog.options_group WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let options = sqlx::query_as::<_, CatalogOption>(&format!(
            "SELECT {OPTION_COLUMNS} FROM catalog.option
             WHERE options_group_id = $1
             ORDER BY priority DESC, name"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(OptionsGroupWithOptions { group, options })
    }

    /// Options of several groups at once, ordered for display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn options_of_groups(
        &self,
        group_ids: &[OptionsGroupId],
    ) -> Result<Vec<CatalogOption>, RepositoryError> {
        let ids: Vec<i32> = group_ids.iter().map(OptionsGroupId::as_i32).collect();
        let options = sqlx::query_as::<_, CatalogOption>(&format!(
            "SELECT {OPTION_COLUMNS} FROM catalog.option
             WHERE options_group_id = ANY($1)
             ORDER BY priority DESC, name"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(options)
    }

    /// Create an options group.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_group(
        &self,
        input: &OptionsGroupInput,
    ) -> Result<OptionsGroup, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, OptionsGroup>(&format!(
            "INSERT INTO catalog.options_group (name, variant) VALUES ($1, $2)
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(name)
        .bind(input.variant)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "options group name already exists"))
    }

    /// Rename a group or change its variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the group does not exist.
    pub async fn update_group(
        &self,
        id: OptionsGroupId,
        input: &OptionsGroupInput,
    ) -> Result<OptionsGroup, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, OptionsGroup>(&format!(
            "UPDATE catalog.options_group SET name = $2, variant = $3 WHERE id = $1
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(input.variant)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "options group name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a group and its options.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` while an attribute still uses the group.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, id: OptionsGroupId) -> Result<(), RepositoryError> {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM catalog.attribute WHERE options_group_id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        if in_use {
            return Err(RepositoryError::Invalid(
                "options group is used by an attribute".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM catalog.options_group WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add an option to a group.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug already exists in the group.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_option(
        &self,
        group_id: OptionsGroupId,
        input: &OptionInput,
    ) -> Result<CatalogOption, RepositoryError> {
        let name = required_name(&input.name)?;
        let slug = input.resolved_slug()?;
        sqlx::query_as::<_, CatalogOption>(&format!(
            "INSERT INTO catalog.option (options_group_id, name, slug, color, icon, priority)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {OPTION_COLUMNS}"
        ))
        .bind(group_id)
        .bind(name)
        .bind(&slug)
        .bind(input.color.as_deref())
        .bind(input.icon.as_deref())
        .bind(input.priority)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "option slug already exists in this group"))
    }

    /// Update an option.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the option does not exist.
    pub async fn update_option(
        &self,
        id: OptionId,
        input: &OptionInput,
    ) -> Result<CatalogOption, RepositoryError> {
        let name = required_name(&input.name)?;
        let slug = input.resolved_slug()?;
        sqlx::query_as::<_, CatalogOption>(&format!(
            "UPDATE catalog.option
             SET name = $2, slug = $3, color = $4, icon = $5, priority = $6
             WHERE id = $1
             RETURNING {OPTION_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(&slug)
        .bind(input.color.as_deref())
        .bind(input.icon.as_deref())
        .bind(input.priority)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "option slug already exists in this group"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an option and strip it from product attribute values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a variant connection uses the option.
    #[instrument(skip(self))]
    pub async fn delete_option(&self, id: OptionId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE catalog.product_attribute
             SET option_ids = array_remove(option_ids, $1)
             WHERE option_ids @> ARRAY[$1]",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM catalog.option WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "option"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str, slug: Option<&str>) -> OptionInput {
        OptionInput {
            name: name.to_owned(),
            slug: slug.map(|s| Slug::parse(s).unwrap()),
            color: None,
            icon: None,
            priority: 0,
        }
    }

    #[test]
    fn test_slug_derived_from_name_uses_underscores() {
        let slug = input("Pinot Noir", None).resolved_slug().unwrap();
        assert_eq!(slug.as_str(), "pinot_noir");
    }

    #[test]
    fn test_explicit_slug_must_be_key() {
        assert!(matches!(
            input("Pinot Noir", Some("pinot-noir")).resolved_slug(),
            Err(RepositoryError::Invalid(_))
        ));
        let slug = input("Pinot Noir", Some("pn")).resolved_slug().unwrap();
        assert_eq!(slug.as_str(), "pn");
    }
}
