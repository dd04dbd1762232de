//! Product database operations.
//!
//! A product belongs to one rubric, carries attribute values for the
//! attributes of that rubric's groups, and is sold by shops through shop
//! products (price and stock per shop).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::instrument;

use agora_core::{
    AttributeId, AttributeVariant, AttributeViewVariant, Money, OptionId, ProductId, RubricId,
    ShopId, ShopProductId, Slug,
};

use super::attributes::{Attribute, AttributesRepository};
use super::companies::required_name;
use super::connections::leave_connections;
use super::rubrics::RubricRepository;
use super::{DEFAULT_PAGE_SIZE, RepositoryError, map_write_error, page_offset};

/// A product row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub rubric_id: RubricId,
    /// Human-facing article number.
    pub item_id: String,
    pub name: String,
    pub original_name: String,
    pub slug: Slug,
    pub description: String,
    pub active: bool,
    pub views: i64,
    pub uniqueness_text_id: Option<String>,
    pub uniqueness_percent: Option<Decimal>,
    pub uniqueness_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or updating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub rubric_id: RubricId,
    pub name: String,
    #[serde(default)]
    pub original_name: String,
    /// Generated from the name when absent.
    pub slug: Option<Slug>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductInput {
    fn resolved_slug(&self) -> Result<Slug, RepositoryError> {
        match &self.slug {
            Some(slug) => Ok(slug.clone()),
            None => Slug::from_name(&self.name, '-')
                .map_err(|e| RepositoryError::Invalid(format!("product slug: {e}"))),
        }
    }
}

/// Admin product listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListFilter {
    pub rubric_id: Option<RubricId>,
    /// Case-insensitive match on name, original name or item ID.
    pub search: Option<String>,
    #[serde(default)]
    pub page: u32,
}

/// A value to store for one attribute of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Options(Vec<OptionId>),
    Text(String),
    Number(Decimal),
}

impl AttributeValue {
    /// Check the value against the attribute's variant and, for select
    /// attributes, the option IDs of its group. Returns the value to store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the value kind does not match the
    /// variant, a single select gets more than one option, an option is
    /// foreign to the group, or a text value is blank.
    pub fn validated(
        self,
        variant: AttributeVariant,
        group_options: &[OptionId],
    ) -> Result<Self, RepositoryError> {
        match (variant, self) {
            (AttributeVariant::Select | AttributeVariant::MultipleSelect, Self::Options(mut ids)) => {
                ids.sort_unstable_by_key(OptionId::as_i32);
                ids.dedup();
                if ids.is_empty() {
                    return Err(RepositoryError::Invalid("select at least one option".to_owned()));
                }
                if variant == AttributeVariant::Select && ids.len() > 1 {
                    return Err(RepositoryError::Invalid(
                        "this attribute takes a single option".to_owned(),
                    ));
                }
                if let Some(foreign) = ids.iter().find(|id| !group_options.contains(*id)) {
                    return Err(RepositoryError::Invalid(format!(
                        "option {foreign} does not belong to the attribute's options group"
                    )));
                }
                Ok(Self::Options(ids))
            }
            (AttributeVariant::Text, Self::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(RepositoryError::Invalid("text value cannot be empty".to_owned()));
                }
                Ok(Self::Text(text.to_owned()))
            }
            (AttributeVariant::Number, Self::Number(n)) => Ok(Self::Number(n)),
            (variant, _) => Err(RepositoryError::Invalid(format!(
                "value does not match attribute variant {variant:?}"
            ))),
        }
    }
}

/// A stored attribute value.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductAttribute {
    pub product_id: ProductId,
    pub attribute_id: AttributeId,
    pub option_ids: Vec<i32>,
    pub text_value: Option<String>,
    pub number_value: Option<Decimal>,
}

/// An attribute value resolved for display on the product card.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CardAttribute {
    pub attribute_id: AttributeId,
    pub name: String,
    pub slug: Slug,
    pub view_variant: AttributeViewVariant,
    pub metric: Option<String>,
    pub show_in_card_title: bool,
    pub option_names: Vec<String>,
    pub text_value: Option<String>,
    pub number_value: Option<Decimal>,
}

/// Price and stock of a product in one shop.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShopProduct {
    pub id: ShopProductId,
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub price: Money,
    pub old_price: Option<Money>,
    pub available: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A shop product joined with the shop it is sold in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShopOffer {
    pub shop_product_id: ShopProductId,
    pub shop_id: ShopId,
    pub shop_name: String,
    pub shop_slug: Slug,
    pub city: String,
    pub address: String,
    pub price: Money,
    pub old_price: Option<Money>,
    pub available: i32,
}

/// Fields for creating or updating a shop product.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopProductInput {
    pub price: Money,
    pub old_price: Option<Money>,
    pub available: u32,
}

/// Product fields fed into the search index.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchDocument {
    pub id: ProductId,
    pub name: String,
    pub original_name: String,
    pub slug: Slug,
    pub description: String,
    pub item_id: String,
    pub rubric_name: String,
    pub rubric_slug: Slug,
}

const PRODUCT_COLUMNS: &str = "id, rubric_id, item_id, name, original_name, slug, description, \
     active, views, uniqueness_text_id, uniqueness_percent, uniqueness_checked_at, \
     created_at, updated_at";
const SHOP_PRODUCT_COLUMNS: &str =
    "id, shop_id, product_id, price, old_price, available, created_at, updated_at";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products for the admin console, newest first.
    ///
    /// Returns the page and the total number of matching products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductListFilter,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM catalog.product p WHERE TRUE");
        push_list_filter(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(self.pool).await?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p WHERE TRUE"
        ));
        push_list_filter(&mut select, filter);
        select
            .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
            .push_bind(DEFAULT_PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind(page_offset(filter.page, DEFAULT_PAGE_SIZE));
        let products = select
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok((products, total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active product has this slug.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product WHERE slug = $1 AND active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a product. The item ID is assigned by the database.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or the rubric
    /// does not exist.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let name = required_name(&input.name)?;
        let slug = input.resolved_slug()?;
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO catalog.product (rubric_id, name, original_name, slug, description, active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.rubric_id)
        .bind(name)
        .bind(input.original_name.trim())
        .bind(&slug)
        .bind(&input.description)
        .bind(input.active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "product slug already exists"))
    }

    /// Update a product.
    ///
    /// Moving a product to another rubric drops the attribute values that the
    /// new rubric does not know about and takes the product out of its variant
    /// connections, whose other members stay in the old rubric.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let name = required_name(&input.name)?;
        let slug = input.resolved_slug()?;
        let mut tx = self.pool.begin().await?;

        let previous_rubric = lock_product(&mut tx, id).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE catalog.product
             SET rubric_id = $2, name = $3, original_name = $4, slug = $5, description = $6,
                 active = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.rubric_id)
        .bind(name)
        .bind(input.original_name.trim())
        .bind(&slug)
        .bind(&input.description)
        .bind(input.active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "product slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "DELETE FROM catalog.product_attribute pa
             WHERE pa.product_id = $1
               AND NOT EXISTS (
                   SELECT 1 FROM catalog.attribute a
                   JOIN catalog.rubric_attributes_group rag
                     ON rag.attributes_group_id = a.attributes_group_id
                   WHERE a.id = pa.attribute_id AND rag.rubric_id = $2
               )",
        )
        .bind(id)
        .bind(input.rubric_id)
        .execute(&mut *tx)
        .await?;

        if previous_rubric != input.rubric_id {
            let left = leave_connections(&mut tx, id).await?;
            if !left.is_empty() {
                tracing::info!(
                    product_id = %id,
                    connections = left.len(),
                    "Product left its connections after a rubric move"
                );
            }
        }

        tx.commit().await?;
        Ok(product)
    }

    /// Delete a product. Order snapshots keep their copy of the product data;
    /// connections left without members go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, id).await?;
        leave_connections(&mut tx, id).await?;

        sqlx::query("DELETE FROM catalog.product WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "product"))?;

        tx.commit().await?;
        Ok(())
    }

    /// Set the value of one attribute on a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the attribute is not part of the
    /// product's rubric, the value does not fit the attribute, or the product
    /// takes part in a variant connection keyed by this attribute and the
    /// value would change its option.
    #[instrument(skip(self, value))]
    pub async fn set_attribute(
        &self,
        id: ProductId,
        attribute_id: AttributeId,
        value: AttributeValue,
    ) -> Result<ProductAttribute, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let rubric_id = lock_product(&mut tx, id).await?;
        let attribute = AttributesRepository::new(self.pool).get(attribute_id).await?;
        if !RubricRepository::new(self.pool)
            .has_attribute(rubric_id, attribute_id)
            .await?
        {
            return Err(RepositoryError::Invalid(
                "attribute is not used by the product's rubric".to_owned(),
            ));
        }

        let group_options = self.group_option_ids(&attribute).await?;
        let value = value.validated(attribute.variant, &group_options)?;

        check_connected_value(connected_option(&mut tx, id, attribute_id).await?, &value)?;

        let (option_ids, text_value, number_value): (Vec<i32>, Option<String>, Option<Decimal>) =
            match value {
                AttributeValue::Options(ids) => {
                    (ids.iter().map(OptionId::as_i32).collect(), None, None)
                }
                AttributeValue::Text(text) => (Vec::new(), Some(text), None),
                AttributeValue::Number(n) => (Vec::new(), None, Some(n)),
            };

        let stored = sqlx::query_as::<_, ProductAttribute>(
            "INSERT INTO catalog.product_attribute
                (product_id, attribute_id, option_ids, text_value, number_value)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (product_id, attribute_id) DO UPDATE
             SET option_ids = EXCLUDED.option_ids,
                 text_value = EXCLUDED.text_value,
                 number_value = EXCLUDED.number_value
             RETURNING product_id, attribute_id, option_ids, text_value, number_value",
        )
        .bind(id)
        .bind(attribute_id)
        .bind(option_ids)
        .bind(text_value)
        .bind(number_value)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    /// Remove the value of one attribute from a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if a variant connection is keyed by
    /// the attribute and `RepositoryError::NotFound` if no value was set.
    #[instrument(skip(self))]
    pub async fn remove_attribute(
        &self,
        id: ProductId,
        attribute_id: AttributeId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, id).await?;
        if connected_option(&mut tx, id, attribute_id).await?.is_some() {
            return Err(RepositoryError::Invalid(
                "remove the product from its variant connection first".to_owned(),
            ));
        }
        let result = sqlx::query(
            "DELETE FROM catalog.product_attribute WHERE product_id = $1 AND attribute_id = $2",
        )
        .bind(id)
        .bind(attribute_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Raw attribute values of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn attributes(&self, id: ProductId) -> Result<Vec<ProductAttribute>, RepositoryError> {
        let values = sqlx::query_as::<_, ProductAttribute>(
            "SELECT product_id, attribute_id, option_ids, text_value, number_value
             FROM catalog.product_attribute WHERE product_id = $1",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(values)
    }

    /// Attribute values resolved to names, ordered by attribute position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn card_attributes(&self, id: ProductId) -> Result<Vec<CardAttribute>, RepositoryError> {
        let values = sqlx::query_as::<_, CardAttribute>(
            "SELECT a.id AS attribute_id, a.name, a.slug, a.view_variant, a.metric,
                    a.show_in_card_title, pa.text_value, pa.number_value,
                    ARRAY(
                        SELECT o.name FROM catalog.option o
                        WHERE o.id = ANY(pa.option_ids)
                        ORDER BY o.priority DESC, o.name
                    ) AS option_names
             FROM catalog.product_attribute pa
             JOIN catalog.attribute a ON a.id = pa.attribute_id
             WHERE pa.product_id = $1
             ORDER BY a.position, a.name",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(values)
    }

    /// Count one more view of a product card.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn increment_views(&self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE catalog.product SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// All shop products of a product, for the admin console.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shop_products(&self, id: ProductId) -> Result<Vec<ShopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShopProduct>(&format!(
            "SELECT {SHOP_PRODUCT_COLUMNS} FROM catalog.shop_product
             WHERE product_id = $1 ORDER BY price"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// In-stock offers of a product with shop details, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn offers(&self, id: ProductId) -> Result<Vec<ShopOffer>, RepositoryError> {
        let offers = sqlx::query_as::<_, ShopOffer>(
            "SELECT sp.id AS shop_product_id, s.id AS shop_id, s.name AS shop_name,
                    s.slug AS shop_slug, s.city, s.address,
                    sp.price, sp.old_price, sp.available
             FROM catalog.shop_product sp
             JOIN catalog.shop s ON s.id = sp.shop_id
             WHERE sp.product_id = $1 AND sp.available > 0
             ORDER BY sp.price, s.name",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Create or update the price and stock of a product in a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the stock does not fit the column
    /// and `RepositoryError::Conflict` if the shop or product does not exist.
    #[instrument(skip(self, input))]
    pub async fn upsert_shop_product(
        &self,
        id: ProductId,
        shop_id: ShopId,
        input: &ShopProductInput,
    ) -> Result<ShopProduct, RepositoryError> {
        let available = i32::try_from(input.available)
            .map_err(|_| RepositoryError::Invalid("stock is too large".to_owned()))?;
        sqlx::query_as::<_, ShopProduct>(&format!(
            "INSERT INTO catalog.shop_product (shop_id, product_id, price, old_price, available)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (shop_id, product_id) DO UPDATE
             SET price = EXCLUDED.price,
                 old_price = EXCLUDED.old_price,
                 available = EXCLUDED.available,
                 updated_at = NOW()
             RETURNING {SHOP_PRODUCT_COLUMNS}"
        ))
        .bind(shop_id)
        .bind(id)
        .bind(input.price)
        .bind(input.old_price)
        .bind(available)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "shop product"))
    }

    /// Stop selling a product in a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the shop did not sell it.
    #[instrument(skip(self))]
    pub async fn delete_shop_product(
        &self,
        id: ProductId,
        shop_id: ShopId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM catalog.shop_product WHERE product_id = $1 AND shop_id = $2")
                .bind(id)
                .bind(shop_id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remember the text ID returned by the uniqueness service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_uniqueness_text_id(
        &self,
        id: ProductId,
        text_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE catalog.product
             SET uniqueness_text_id = $2, uniqueness_percent = NULL, uniqueness_checked_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(text_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Store the uniqueness percentage of the product description.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the percentage is outside 0..=100.
    pub async fn store_uniqueness(
        &self,
        id: ProductId,
        percent: Decimal,
    ) -> Result<Product, RepositoryError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(RepositoryError::Invalid(format!(
                "uniqueness must be between 0 and 100, got {percent}"
            )));
        }
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE catalog.product
             SET uniqueness_percent = $2, uniqueness_checked_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(percent.round_dp(2))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Active products of active rubrics, for building the search index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_documents(&self) -> Result<Vec<SearchDocument>, RepositoryError> {
        let docs = sqlx::query_as::<_, SearchDocument>(
            "SELECT p.id, p.name, p.original_name, p.slug, p.description, p.item_id,
                    r.name AS rubric_name, r.slug AS rubric_slug
             FROM catalog.product p
             JOIN catalog.rubric r ON r.id = p.rubric_id
             WHERE p.active AND r.active",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(docs)
    }

    async fn group_option_ids(&self, attribute: &Attribute) -> Result<Vec<OptionId>, RepositoryError> {
        let Some(group_id) = attribute.options_group_id else {
            return Ok(Vec::new());
        };
        let ids = sqlx::query_scalar::<_, OptionId>(
            "SELECT id FROM catalog.option WHERE options_group_id = $1",
        )
        .bind(group_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}

/// Lock a product row for the rest of the transaction and return its rubric.
///
/// Connection changes lock the same row, so value edits and membership
/// changes on one product never interleave.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
) -> Result<RubricId, RepositoryError> {
    sqlx::query_scalar::<_, RubricId>(
        "SELECT rubric_id FROM catalog.product WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)
}

async fn connected_option(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
    attribute_id: AttributeId,
) -> Result<Option<OptionId>, RepositoryError> {
    let option = sqlx::query_scalar::<_, OptionId>(
        "SELECT option_id FROM catalog.connection_product
         WHERE product_id = $1 AND attribute_id = $2",
    )
    .bind(id)
    .bind(attribute_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(option)
}

/// A connected product keeps the option that places it in its connection.
fn check_connected_value(
    connected: Option<OptionId>,
    value: &AttributeValue,
) -> Result<(), RepositoryError> {
    match connected {
        Some(option) if *value != AttributeValue::Options(vec![option]) => {
            Err(RepositoryError::Invalid(
                "remove the product from its variant connection before changing this value"
                    .to_owned(),
            ))
        }
        _ => Ok(()),
    }
}

fn push_list_filter(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ProductListFilter) {
    if let Some(rubric_id) = filter.rubric_id {
        qb.push(" AND p.rubric_id = ").push_bind(rubric_id);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.original_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.item_id ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(raw: &[i32]) -> Vec<OptionId> {
        raw.iter().copied().map(OptionId::new).collect()
    }

    #[test]
    fn test_single_select_takes_one_option() {
        let group = ids(&[1, 2, 3]);
        let ok = AttributeValue::Options(ids(&[2, 2]))
            .validated(AttributeVariant::Select, &group)
            .unwrap();
        assert_eq!(ok, AttributeValue::Options(ids(&[2])));

        let err = AttributeValue::Options(ids(&[1, 2])).validated(AttributeVariant::Select, &group);
        assert!(matches!(err, Err(RepositoryError::Invalid(_))));
    }

    #[test]
    fn test_multiple_select_sorts_and_checks_group() {
        let group = ids(&[1, 2, 3]);
        let ok = AttributeValue::Options(ids(&[3, 1]))
            .validated(AttributeVariant::MultipleSelect, &group)
            .unwrap();
        assert_eq!(ok, AttributeValue::Options(ids(&[1, 3])));

        let foreign =
            AttributeValue::Options(ids(&[1, 9])).validated(AttributeVariant::MultipleSelect, &group);
        assert!(foreign.is_err());
        let empty = AttributeValue::Options(vec![]).validated(AttributeVariant::MultipleSelect, &group);
        assert!(empty.is_err());
    }

    #[test]
    fn test_kind_must_match_variant() {
        assert!(AttributeValue::Text("dry".to_owned())
            .validated(AttributeVariant::Number, &[])
            .is_err());
        assert!(AttributeValue::Number(Decimal::new(135, 1))
            .validated(AttributeVariant::Number, &[])
            .is_ok());
        assert!(AttributeValue::Text("   ".to_owned())
            .validated(AttributeVariant::Text, &[])
            .is_err());
    }

    #[test]
    fn test_connected_product_keeps_its_option() {
        let keep = AttributeValue::Options(ids(&[4]));
        assert!(check_connected_value(Some(OptionId::new(4)), &keep).is_ok());

        let change = AttributeValue::Options(ids(&[5]));
        assert!(matches!(
            check_connected_value(Some(OptionId::new(4)), &change),
            Err(RepositoryError::Invalid(_))
        ));
        assert!(check_connected_value(None, &change).is_ok());
    }

    #[test]
    fn test_value_json_shape() {
        let value: AttributeValue =
            serde_json::from_str(r#"{"kind":"options","value":[4,5]}"#).unwrap();
        assert_eq!(value, AttributeValue::Options(ids(&[4, 5])));
        let value: AttributeValue = serde_json::from_str(r#"{"kind":"number","value":"0.75"}"#).unwrap();
        assert_eq!(value, AttributeValue::Number(Decimal::new(75, 2)));
    }

    #[test]
    fn test_list_filter_sql() {
        let filter = ProductListFilter {
            rubric_id: Some(RubricId::new(3)),
            search: Some(" 50% ".to_owned()),
            page: 2,
        };
        let mut qb = QueryBuilder::new("SELECT 1 FROM catalog.product p WHERE TRUE");
        push_list_filter(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("p.rubric_id = $1"));
        assert!(sql.contains("p.item_id ILIKE $4"));
        assert_eq!(escape_like("50%"), "50\\%");
    }

    #[test]
    fn test_product_slug_from_name() {
        let input = ProductInput {
            rubric_id: RubricId::new(1),
            name: "Château Margaux 2015".to_owned(),
            original_name: String::new(),
            slug: None,
            description: String::new(),
            active: true,
        };
        assert_eq!(input.resolved_slug().unwrap().as_str(), "ch-teau-margaux-2015");
    }
}
