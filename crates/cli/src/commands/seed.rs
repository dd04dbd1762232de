//! Seed the catalogue from a YAML fixture.
//!
//! The fixture is parsed and validated before connecting; every row is then
//! written in one transaction, so a failure leaves the database untouched.
//! See [`agora_cli::fixture`] for the format.

use std::collections::HashMap;
use std::path::Path;

use sqlx::{Postgres, Transaction};
use thiserror::Error;

use agora_cli::fixture::{Fixture, ResolvedValue};
use agora_core::{
    AttributeId, AttributeVariant, AttributesGroupId, CompanyId, OptionId, OptionsGroupId,
    ProductId, RubricId, ShopId,
};

use super::{ConnectError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A reference that validation should have caught.
    #[error("Unresolved reference: {0}")]
    Unresolved(String),
}

/// Rows written per table.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub options: usize,
    pub attributes: usize,
    pub rubrics: usize,
    pub shops: usize,
    pub products: usize,
}

/// Load a fixture file into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or any insert fails.
pub async fn run(file_path: &str) -> Result<SeedSummary, SeedError> {
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|e| SeedError::Read(file_path.to_owned(), e))?;
    let fixture = Fixture::from_yaml(&content)?;

    let errors = fixture.validate();
    if !errors.is_empty() {
        tracing::error!("Fixture validation failed:");
        for err in &errors {
            tracing::error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }
    tracing::info!(path = %file_path, "Fixture validated");

    let pool = connect().await?;
    let mut tx = pool.begin().await?;
    let summary = Seeder::default().seed(&mut tx, &fixture).await?;
    tx.commit().await?;

    tracing::info!("Seeding complete!");
    tracing::info!("  Options: {}", summary.options);
    tracing::info!("  Attributes: {}", summary.attributes);
    tracing::info!("  Rubrics: {}", summary.rubrics);
    tracing::info!("  Shops: {}", summary.shops);
    tracing::info!("  Products: {}", summary.products);
    Ok(summary)
}

/// Name and slug lookups built up while inserting.
#[derive(Default)]
struct Seeder {
    options_groups: HashMap<String, OptionsGroupId>,
    /// (options group id, option slug) -> option id
    options: HashMap<(OptionsGroupId, String), OptionId>,
    attributes_groups: HashMap<String, AttributesGroupId>,
    /// attribute slug -> (id, variant, options group)
    attributes: HashMap<String, (AttributeId, AttributeVariant, Option<OptionsGroupId>)>,
    rubrics: HashMap<String, RubricId>,
    shops: HashMap<String, ShopId>,
    summary: SeedSummary,
}

fn lookup<K, V>(map: &HashMap<K, V>, key: &K, what: &str) -> Result<V, SeedError>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
    V: Clone,
{
    map.get(key)
        .cloned()
        .ok_or_else(|| SeedError::Unresolved(format!("{what} {key:?}")))
}

impl Seeder {
    async fn seed(
        mut self,
        tx: &mut Transaction<'_, Postgres>,
        fixture: &Fixture,
    ) -> Result<SeedSummary, SeedError> {
        self.options_groups(tx, fixture).await?;
        self.attributes_groups(tx, fixture).await?;
        self.rubrics(tx, fixture).await?;
        self.companies(tx, fixture).await?;
        self.products(tx, fixture).await?;
        Ok(self.summary)
    }

    async fn options_groups(
        &mut self,
        tx: &mut Transaction<'_, Postgres>,
        fixture: &Fixture,
    ) -> Result<(), SeedError> {
        for group in &fixture.options_groups {
            let group_id: OptionsGroupId = sqlx::query_scalar(
                "INSERT INTO catalog.options_group (name, variant) VALUES ($1, $2) RETURNING id",
            )
            .bind(group.name.trim())
            .bind(group.variant)
            .fetch_one(&mut **tx)
            .await?;
            self.options_groups.insert(group.name.clone(), group_id);

            for option in &group.options {
                let slug = option
                    .resolved_slug()
                    .map_err(|e| SeedError::Unresolved(e.to_string()))?;
                let option_id: OptionId = sqlx::query_scalar(
                    "INSERT INTO catalog.option (options_group_id, name, slug, color, icon, priority)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING id",
                )
                .bind(group_id)
                .bind(option.name.trim())
                .bind(&slug)
                .bind(option.color.as_deref())
                .bind(option.icon.as_deref())
                .bind(option.priority)
                .fetch_one(&mut **tx)
                .await?;
                self.options
                    .insert((group_id, slug.as_str().to_owned()), option_id);
                self.summary.options += 1;
            }
        }
        Ok(())
    }

    async fn attributes_groups(
        &mut self,
        tx: &mut Transaction<'_, Postgres>,
        fixture: &Fixture,
    ) -> Result<(), SeedError> {
        for group in &fixture.attributes_groups {
            let group_id: AttributesGroupId = sqlx::query_scalar(
                "INSERT INTO catalog.attributes_group (name) VALUES ($1) RETURNING id",
            )
            .bind(group.name.trim())
            .fetch_one(&mut **tx)
            .await?;
            self.attributes_groups.insert(group.name.clone(), group_id);

            for attribute in &group.attributes {
                let options_group_id = attribute
                    .options_group
                    .as_ref()
                    .map(|name| lookup(&self.options_groups, name, "options group"))
                    .transpose()?;
                let input = attribute.to_input(options_group_id);

                let attribute_id: AttributeId = sqlx::query_scalar(
                    "INSERT INTO catalog.attribute
                         (attributes_group_id, name, slug, variant, view_variant, options_group_id,
                          metric, show_in_catalogue_filter, show_in_card_title, position)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                     RETURNING id",
                )
                .bind(group_id)
                .bind(input.name.trim())
                .bind(&input.slug)
                .bind(input.variant)
                .bind(input.view_variant)
                .bind(input.options_group_id)
                .bind(input.metric.as_deref())
                .bind(input.show_in_catalogue_filter)
                .bind(input.show_in_card_title)
                .bind(input.position)
                .fetch_one(&mut **tx)
                .await?;
                self.attributes.insert(
                    input.slug.as_str().to_owned(),
                    (attribute_id, input.variant, options_group_id),
                );
                self.summary.attributes += 1;
            }
        }
        Ok(())
    }

    async fn rubrics(
        &mut self,
        tx: &mut Transaction<'_, Postgres>,
        fixture: &Fixture,
    ) -> Result<(), SeedError> {
        for rubric in &fixture.rubrics {
            let parent_id = rubric
                .parent
                .as_ref()
                .map(|slug| lookup(&self.rubrics, &slug.as_str().to_owned(), "rubric"))
                .transpose()?;

            let rubric_id: RubricId = sqlx::query_scalar(
                "INSERT INTO catalog.rubric (parent_id, name, slug, description, active, priority)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
            )
            .bind(parent_id)
            .bind(rubric.name.trim())
            .bind(&rubric.slug)
            .bind(&rubric.description)
            .bind(rubric.active)
            .bind(rubric.priority)
            .fetch_one(&mut **tx)
            .await?;

            for name in &rubric.attributes_groups {
                let group_id = lookup(&self.attributes_groups, name, "attributes group")?;
                sqlx::query(
                    "INSERT INTO catalog.rubric_attributes_group (rubric_id, attributes_group_id)
                     VALUES ($1, $2)",
                )
                .bind(rubric_id)
                .bind(group_id)
                .execute(&mut **tx)
                .await?;
            }

            self.rubrics
                .insert(rubric.slug.as_str().to_owned(), rubric_id);
            self.summary.rubrics += 1;
        }
        Ok(())
    }

    async fn companies(
        &mut self,
        tx: &mut Transaction<'_, Postgres>,
        fixture: &Fixture,
    ) -> Result<(), SeedError> {
        for company in &fixture.companies {
            let company_id: CompanyId = sqlx::query_scalar(
                "INSERT INTO catalog.company (name, slug, email, phone)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
            )
            .bind(company.name.trim())
            .bind(&company.slug)
            .bind(company.email.as_ref().map(agora_core::Email::as_str))
            .bind(company.phone.as_ref().map(agora_core::Phone::as_str))
            .fetch_one(&mut **tx)
            .await?;

            for shop in &company.shops {
                let shop_id: ShopId = sqlx::query_scalar(
                    "INSERT INTO catalog.shop (company_id, name, slug, city, address, email, phone)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     RETURNING id",
                )
                .bind(company_id)
                .bind(shop.name.trim())
                .bind(&shop.slug)
                .bind(shop.city.trim())
                .bind(shop.address.trim())
                .bind(shop.email.as_ref().map(agora_core::Email::as_str))
                .bind(shop.phone.as_ref().map(agora_core::Phone::as_str))
                .fetch_one(&mut **tx)
                .await?;
                self.shops.insert(shop.slug.as_str().to_owned(), shop_id);
                self.summary.shops += 1;
            }
        }
        Ok(())
    }

    async fn products(
        &mut self,
        tx: &mut Transaction<'_, Postgres>,
        fixture: &Fixture,
    ) -> Result<(), SeedError> {
        for product in &fixture.products {
            let slug = product.resolved_slug().map_err(SeedError::Unresolved)?;
            let rubric_id = lookup(
                &self.rubrics,
                &product.rubric.as_str().to_owned(),
                "rubric",
            )?;

            let product_id: ProductId = sqlx::query_scalar(
                "INSERT INTO catalog.product (rubric_id, name, original_name, slug, description, active)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
            )
            .bind(rubric_id)
            .bind(product.name.trim())
            .bind(product.original_name.trim())
            .bind(&slug)
            .bind(&product.description)
            .bind(product.active)
            .fetch_one(&mut **tx)
            .await?;

            for (attribute_slug, raw) in &product.attributes {
                let (attribute_id, variant, options_group_id) =
                    lookup(&self.attributes, attribute_slug, "attribute")?;
                let value = raw.resolve(variant).map_err(SeedError::Unresolved)?;

                let (option_ids, text, number) = match value {
                    ResolvedValue::Options(slugs) => {
                        let group_id = options_group_id.ok_or_else(|| {
                            SeedError::Unresolved(format!("options group of {attribute_slug}"))
                        })?;
                        let ids = slugs
                            .into_iter()
                            .map(|slug| lookup(&self.options, &(group_id, slug), "option"))
                            .collect::<Result<Vec<OptionId>, _>>()?;
                        (ids, None, None)
                    }
                    ResolvedValue::Text(text) => (Vec::new(), Some(text), None),
                    ResolvedValue::Number(number) => (Vec::new(), None, Some(number)),
                };

                sqlx::query(
                    "INSERT INTO catalog.product_attribute
                         (product_id, attribute_id, option_ids, text_value, number_value)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(product_id)
                .bind(attribute_id)
                .bind(option_ids.iter().map(OptionId::as_i32).collect::<Vec<_>>())
                .bind(text)
                .bind(number)
                .execute(&mut **tx)
                .await?;
            }

            for (shop_slug, offer) in &product.shops {
                let shop_id = lookup(&self.shops, shop_slug, "shop")?;
                sqlx::query(
                    "INSERT INTO catalog.shop_product (shop_id, product_id, price, old_price, available)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(shop_id)
                .bind(product_id)
                .bind(offer.price)
                .bind(offer.old_price)
                .bind(i32::try_from(offer.available).unwrap_or(i32::MAX))
                .execute(&mut **tx)
                .await?;
            }

            self.summary.products += 1;
        }
        Ok(())
    }
}
