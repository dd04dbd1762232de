//! Rubric (catalogue section) database operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use agora_core::{AttributeId, AttributesGroupId, OptionsGroupId, RubricId, Slug};

use super::attributes::Attribute;
use super::companies::required_name;
use super::options::{CatalogOption, OptionsRepository};
use super::{RepositoryError, map_write_error};

/// A catalogue section.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rubric {
    pub id: RubricId,
    pub parent_id: Option<RubricId>,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub active: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or updating a rubric.
#[derive(Debug, Clone, Deserialize)]
pub struct RubricInput {
    pub name: String,
    pub slug: Slug,
    pub parent_id: Option<RubricId>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub priority: i32,
}

const fn default_active() -> bool {
    true
}

/// A filterable attribute of a rubric with the options of its group.
#[derive(Debug, Clone, Serialize)]
pub struct FilterAttribute {
    pub attribute: Attribute,
    pub options: Vec<CatalogOption>,
}

const RUBRIC_COLUMNS: &str =
    "id, parent_id, name, slug, description, active, priority, created_at, updated_at";

/// Repository for rubric database operations.
pub struct RubricRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RubricRepository<'a> {
    /// Create a new rubric repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all rubrics, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Rubric>, RepositoryError> {
        let rubrics = sqlx::query_as::<_, Rubric>(&format!(
            "SELECT {RUBRIC_COLUMNS} FROM catalog.rubric ORDER BY priority DESC, name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rubrics)
    }

    /// List active rubrics for storefront navigation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Rubric>, RepositoryError> {
        let rubrics = sqlx::query_as::<_, Rubric>(&format!(
            "SELECT {RUBRIC_COLUMNS} FROM catalog.rubric WHERE active
             ORDER BY priority DESC, name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rubrics)
    }

    /// Get a rubric by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rubric does not exist.
    pub async fn get(&self, id: RubricId) -> Result<Rubric, RepositoryError> {
        sqlx::query_as::<_, Rubric>(&format!(
            "SELECT {RUBRIC_COLUMNS} FROM catalog.rubric WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Get an active rubric by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active rubric has this slug.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Rubric, RepositoryError> {
        sqlx::query_as::<_, Rubric>(&format!(
            "SELECT {RUBRIC_COLUMNS} FROM catalog.rubric WHERE slug = $1 AND active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a rubric.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create(&self, input: &RubricInput) -> Result<Rubric, RepositoryError> {
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Rubric>(&format!(
            "INSERT INTO catalog.rubric (parent_id, name, slug, description, active, priority)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {RUBRIC_COLUMNS}"
        ))
        .bind(input.parent_id)
        .bind(name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.active)
        .bind(input.priority)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "rubric slug already exists"))
    }

    /// Update a rubric.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the rubric would become its own
    /// parent and `RepositoryError::NotFound` if it does not exist.
    pub async fn update(&self, id: RubricId, input: &RubricInput) -> Result<Rubric, RepositoryError> {
        if input.parent_id == Some(id) {
            return Err(RepositoryError::Invalid(
                "rubric cannot be its own parent".to_owned(),
            ));
        }
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Rubric>(&format!(
            "UPDATE catalog.rubric
             SET parent_id = $2, name = $3, slug = $4, description = $5, active = $6,
                 priority = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING {RUBRIC_COLUMNS}"
        ))
        .bind(id)
        .bind(input.parent_id)
        .bind(name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.active)
        .bind(input.priority)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "rubric slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a rubric that has no products and no child rubrics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` while products or children remain.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: RubricId) -> Result<(), RepositoryError> {
        let (products, children): (i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM catalog.product WHERE rubric_id = $1),
                (SELECT COUNT(*) FROM catalog.rubric WHERE parent_id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        if products > 0 || children > 0 {
            return Err(RepositoryError::Invalid(format!(
                "rubric still has {products} product(s) and {children} child rubric(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM catalog.rubric WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Attach an attributes group to a rubric. Attaching twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if either side does not exist.
    #[instrument(skip(self))]
    pub async fn attach_attributes_group(
        &self,
        id: RubricId,
        group_id: AttributesGroupId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO catalog.rubric_attributes_group (rubric_id, attributes_group_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(group_id)
        .execute(self.pool)
        .await
        .map_err(|e| map_write_error(e, "rubric attributes group"))?;
        Ok(())
    }

    /// Detach an attributes group from a rubric.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the group was not attached.
    #[instrument(skip(self))]
    pub async fn detach_attributes_group(
        &self,
        id: RubricId,
        group_id: AttributesGroupId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM catalog.rubric_attributes_group
             WHERE rubric_id = $1 AND attributes_group_id = $2",
        )
        .bind(id)
        .bind(group_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// IDs of the attributes groups attached to a rubric.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn attributes_group_ids(
        &self,
        id: RubricId,
    ) -> Result<Vec<AttributesGroupId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, AttributesGroupId>(
            "SELECT attributes_group_id FROM catalog.rubric_attributes_group
             WHERE rubric_id = $1 ORDER BY attributes_group_id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Whether an attribute belongs to one of the rubric's groups.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_attribute(
        &self,
        id: RubricId,
        attribute_id: AttributeId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM catalog.attribute a
                JOIN catalog.rubric_attributes_group rag
                  ON rag.attributes_group_id = a.attributes_group_id
                WHERE rag.rubric_id = $1 AND a.id = $2
             )",
        )
        .bind(id)
        .bind(attribute_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Select-type attributes shown in the catalogue filter, with their options.
    ///
    /// Ordered by attribute position; options by priority then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn filter_attributes(
        &self,
        id: RubricId,
    ) -> Result<Vec<FilterAttribute>, RepositoryError> {
        let attributes = sqlx::query_as::<_, Attribute>(
            "SELECT a.id, a.attributes_group_id, a.name, a.slug, a.variant, a.view_variant,
                    a.options_group_id, a.metric, a.show_in_catalogue_filter,
                    a.show_in_card_title, a.position
             FROM catalog.attribute a
             JOIN catalog.rubric_attributes_group rag
               ON rag.attributes_group_id = a.attributes_group_id
             WHERE rag.rubric_id = $1
               AND a.show_in_catalogue_filter
               AND a.variant IN ('select', 'multiple_select')
             ORDER BY a.position, a.name",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let group_ids: Vec<OptionsGroupId> = attributes
            .iter()
            .filter_map(|a| a.options_group_id)
            .collect();
        let options = OptionsRepository::new(self.pool)
            .options_of_groups(&group_ids)
            .await?;

        Ok(group_filter_attributes(attributes, options))
    }
}

/// Pair attributes with the options of their groups, keeping option order.
fn group_filter_attributes(
    attributes: Vec<Attribute>,
    options: Vec<CatalogOption>,
) -> Vec<FilterAttribute> {
    let mut by_group: HashMap<OptionsGroupId, Vec<CatalogOption>> = HashMap::new();
    for option in options {
        by_group
            .entry(option.options_group_id)
            .or_default()
            .push(option);
    }

    attributes
        .into_iter()
        .map(|attribute| {
            let options = attribute
                .options_group_id
                .and_then(|group| by_group.get(&group).cloned())
                .unwrap_or_default();
            FilterAttribute { attribute, options }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agora_core::{AttributeVariant, AttributeViewVariant, OptionId};

    use super::*;

    fn attribute(id: i32, group: i32) -> Attribute {
        Attribute {
            id: AttributeId::new(id),
            attributes_group_id: AttributesGroupId::new(1),
            name: format!("attr {id}"),
            slug: Slug::key(&format!("attr{id}")).unwrap(),
            variant: AttributeVariant::Select,
            view_variant: AttributeViewVariant::List,
            options_group_id: Some(OptionsGroupId::new(group)),
            metric: None,
            show_in_catalogue_filter: true,
            show_in_card_title: false,
            position: 0,
        }
    }

    fn option(id: i32, group: i32) -> CatalogOption {
        CatalogOption {
            id: OptionId::new(id),
            options_group_id: OptionsGroupId::new(group),
            name: format!("opt {id}"),
            slug: Slug::key(&format!("opt{id}")).unwrap(),
            color: None,
            icon: None,
            priority: 0,
        }
    }

    #[test]
    fn test_attributes_sharing_a_group_both_get_options() {
        let grouped = group_filter_attributes(
            vec![attribute(1, 10), attribute(2, 10), attribute(3, 20)],
            vec![option(100, 10), option(101, 10), option(200, 20)],
        );
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].options.len(), 2);
        assert_eq!(grouped[1].options.len(), 2);
        assert_eq!(grouped[2].options[0].id, OptionId::new(200));
    }

    #[test]
    fn test_attribute_without_options_gets_empty_list() {
        let grouped = group_filter_attributes(vec![attribute(1, 99)], vec![option(1, 10)]);
        assert!(grouped[0].options.is_empty());
    }
}
