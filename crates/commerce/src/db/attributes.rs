//! Attributes groups and attributes.
//!
//! Attributes describe product characteristics. They are organised in
//! groups, and rubrics pick which groups apply to their products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use agora_core::{
    AttributeId, AttributeVariant, AttributeViewVariant, AttributesGroupId, OptionsGroupId, Slug,
};

use super::companies::required_name;
use super::{RepositoryError, map_write_error};
use crate::catalogue::filters::RESERVED_KEYS;

/// A named group of attributes ("Taste", "Origin").
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttributesGroup {
    pub id: AttributesGroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A product characteristic.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attribute {
    pub id: AttributeId,
    pub attributes_group_id: AttributesGroupId,
    pub name: String,
    /// Also the catalogue filter key.
    pub slug: Slug,
    pub variant: AttributeVariant,
    pub view_variant: AttributeViewVariant,
    pub options_group_id: Option<OptionsGroupId>,
    pub metric: Option<String>,
    pub show_in_catalogue_filter: bool,
    pub show_in_card_title: bool,
    pub position: i32,
}

/// A group with its attributes ordered by position.
#[derive(Debug, Clone, Serialize)]
pub struct AttributesGroupWithAttributes {
    #[serde(flatten)]
    pub group: AttributesGroup,
    pub attributes: Vec<Attribute>,
}

/// Fields for creating or updating an attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeInput {
    pub name: String,
    pub slug: Slug,
    pub variant: AttributeVariant,
    #[serde(default)]
    pub view_variant: AttributeViewVariant,
    pub options_group_id: Option<OptionsGroupId>,
    pub metric: Option<String>,
    #[serde(default)]
    pub show_in_catalogue_filter: bool,
    #[serde(default)]
    pub show_in_card_title: bool,
    #[serde(default)]
    pub position: i32,
}

impl AttributeInput {
    /// Check the rules the database cannot express in a readable way.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the slug contains `-` or is a
    /// reserved filter key, if a select attribute has no options group, or
    /// if a free-form attribute has one.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if !self.slug.is_key() {
            return Err(RepositoryError::Invalid(
                "attribute slug cannot contain '-'".to_owned(),
            ));
        }
        if RESERVED_KEYS.contains(&self.slug.as_str()) {
            return Err(RepositoryError::Invalid(format!(
                "'{}' is a reserved catalogue filter key",
                self.slug
            )));
        }
        match (self.variant.uses_options(), self.options_group_id) {
            (true, None) => Err(RepositoryError::Invalid(
                "select attributes need an options group".to_owned(),
            )),
            (false, Some(_)) => Err(RepositoryError::Invalid(
                "only select attributes can have an options group".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

const GROUP_COLUMNS: &str = "id, name, created_at";
const ATTRIBUTE_COLUMNS: &str = "id, attributes_group_id, name, slug, variant, view_variant, \
     options_group_id, metric, show_in_catalogue_filter, show_in_card_title, position";

/// Repository for attributes groups and attributes.
pub struct AttributesRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttributesRepository<'a> {
    /// Create a new attributes repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all attributes groups.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_groups(&self) -> Result<Vec<AttributesGroup>, RepositoryError> {
        let groups = sqlx::query_as::<_, AttributesGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM catalog.attributes_group ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(groups)
    }

    /// Get a group with its attributes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the group does not exist.
    pub async fn get_group(
        &self,
        id: AttributesGroupId,
    ) -> Result<AttributesGroupWithAttributes, RepositoryError> {
        let group = sqlx::query_as::<_, AttributesGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM catalog.attributes_group WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let attributes = sqlx::query_as::<_, Attribute>(&format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM catalog.attribute
             WHERE attributes_group_id = $1
             ORDER BY position, name"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(AttributesGroupWithAttributes { group, attributes })
    }

    /// Get a single attribute.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attribute does not exist.
    pub async fn get(&self, id: AttributeId) -> Result<Attribute, RepositoryError> {
        sqlx::query_as::<_, Attribute>(&format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM catalog.attribute WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create an attributes group.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    #[instrument(skip(self))]
    pub async fn create_group(&self, name: &str) -> Result<AttributesGroup, RepositoryError> {
        let name = required_name(name)?;
        sqlx::query_as::<_, AttributesGroup>(&format!(
            "INSERT INTO catalog.attributes_group (name) VALUES ($1) RETURNING {GROUP_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "attributes group name already exists"))
    }

    /// Rename a group.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the group does not exist.
    pub async fn rename_group(
        &self,
        id: AttributesGroupId,
        name: &str,
    ) -> Result<AttributesGroup, RepositoryError> {
        let name = required_name(name)?;
        sqlx::query_as::<_, AttributesGroup>(&format!(
            "UPDATE catalog.attributes_group SET name = $2 WHERE id = $1 RETURNING {GROUP_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "attributes group name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a group with its attributes and their product values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a variant connection is keyed
    /// by one of its attributes.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, id: AttributesGroupId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog.attributes_group WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_write_error(e, "attributes group"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add an attribute to a group.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the input breaks an attribute rule
    /// and `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn add_attribute(
        &self,
        group_id: AttributesGroupId,
        input: &AttributeInput,
    ) -> Result<Attribute, RepositoryError> {
        input.validate()?;
        let name = required_name(&input.name)?;
        sqlx::query_as::<_, Attribute>(&format!(
            "INSERT INTO catalog.attribute
                (attributes_group_id, name, slug, variant, view_variant, options_group_id,
                 metric, show_in_catalogue_filter, show_in_card_title, position)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {ATTRIBUTE_COLUMNS}"
        ))
        .bind(group_id)
        .bind(name)
        .bind(&input.slug)
        .bind(input.variant)
        .bind(input.view_variant)
        .bind(input.options_group_id)
        .bind(input.metric.as_deref())
        .bind(input.show_in_catalogue_filter)
        .bind(input.show_in_card_title)
        .bind(input.position)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "attribute slug already exists"))
    }

    /// Update an attribute.
    ///
    /// Changing the variant of an attribute that already has product values
    /// is refused, since the stored values would no longer match.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for rule violations and
    /// `RepositoryError::NotFound` if the attribute does not exist.
    pub async fn update_attribute(
        &self,
        id: AttributeId,
        input: &AttributeInput,
    ) -> Result<Attribute, RepositoryError> {
        input.validate()?;
        let name = required_name(&input.name)?;
        let current = self.get(id).await?;

        if current.variant != input.variant || current.options_group_id != input.options_group_id
        {
            let (has_values,): (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM catalog.product_attribute WHERE attribute_id = $1)",
            )
            .bind(id)
            .fetch_one(self.pool)
            .await?;
            if has_values {
                return Err(RepositoryError::Invalid(
                    "cannot change the variant or options group of an attribute in use".to_owned(),
                ));
            }
        }

        sqlx::query_as::<_, Attribute>(&format!(
            "UPDATE catalog.attribute
             SET name = $2, slug = $3, variant = $4, view_variant = $5, options_group_id = $6,
                 metric = $7, show_in_catalogue_filter = $8, show_in_card_title = $9,
                 position = $10
             WHERE id = $1
             RETURNING {ATTRIBUTE_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(&input.slug)
        .bind(input.variant)
        .bind(input.view_variant)
        .bind(input.options_group_id)
        .bind(input.metric.as_deref())
        .bind(input.show_in_catalogue_filter)
        .bind(input.show_in_card_title)
        .bind(input.position)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_write_error(e, "attribute slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an attribute and its product values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a variant connection is keyed by it.
    #[instrument(skip(self))]
    pub async fn delete_attribute(&self, id: AttributeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog.attribute WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_write_error(e, "attribute"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(slug: &str, variant: AttributeVariant, group: Option<i32>) -> AttributeInput {
        AttributeInput {
            name: "Colour".to_owned(),
            slug: Slug::parse(slug).unwrap(),
            variant,
            view_variant: AttributeViewVariant::List,
            options_group_id: group.map(OptionsGroupId::new),
            metric: None,
            show_in_catalogue_filter: true,
            show_in_card_title: false,
            position: 0,
        }
    }

    #[test]
    fn test_select_requires_options_group() {
        assert!(input("colour", AttributeVariant::Select, None).validate().is_err());
        assert!(input("colour", AttributeVariant::Select, Some(1)).validate().is_ok());
        assert!(input("colour", AttributeVariant::MultipleSelect, None).validate().is_err());
    }

    #[test]
    fn test_text_rejects_options_group() {
        assert!(input("notes", AttributeVariant::Text, Some(1)).validate().is_err());
        assert!(input("volume", AttributeVariant::Number, None).validate().is_ok());
    }

    #[test]
    fn test_slug_must_be_filter_key() {
        assert!(input("wine-colour", AttributeVariant::Select, Some(1)).validate().is_err());
        assert!(input("wine_colour", AttributeVariant::Select, Some(1)).validate().is_ok());
        assert!(input("price", AttributeVariant::Number, None).validate().is_err());
    }

    #[test]
    fn test_input_deserializes_defaults() {
        let input: AttributeInput = serde_json::from_value(serde_json::json!({
            "name": "Volume",
            "slug": "volume",
            "variant": "number",
            "metric": "ml"
        }))
        .unwrap();
        assert_eq!(input.view_variant, AttributeViewVariant::List);
        assert!(!input.show_in_catalogue_filter);
        assert!(input.validate().is_ok());
    }
}
