//! Faceted catalogue built from URL filter segments.
//!
//! The pipeline runs in four steps:
//!
//! 1. [`filters::FilterSet::parse_path`] turns `colour-red/price-10_50` into a
//!    normalised filter set.
//! 2. [`resolve::resolve`] maps attribute and option slugs to IDs for the
//!    rubric, dropping what it does not know.
//! 3. [`query::CatalogueQuery`] builds the product, count and facet SQL.
//! 4. [`facets`] turns option counts into toggle links.

pub mod facets;
pub mod filters;
pub mod query;
pub mod resolve;

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, instrument};

use agora_core::{Money, OptionId};

use crate::db::rubrics::Rubric;
use crate::db::{RepositoryError, RubricRepository, ShopRepository};
use facets::{Facet, PriceFacet, build_facet, build_price_facet};
use filters::{FilterError, FilterSet};
use query::{CatalogueProduct, CatalogueQuery};

/// Errors from loading a catalogue page.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Everything a catalogue page renders.
#[derive(Debug, Clone, Serialize)]
pub struct CataloguePage {
    pub rubric: Rubric,
    pub products: Vec<CatalogueProduct>,
    pub total: i64,
    pub page: u32,
    pub page_count: u32,
    pub facets: Vec<Facet>,
    pub price: PriceFacet,
    /// Canonical path of this page. Differs from the request when segments
    /// were reordered or dropped.
    pub path: String,
    /// Segments that did not resolve and were ignored.
    pub dropped: Vec<String>,
}

/// Number of pages for `total` products, never less than one.
#[must_use]
pub fn page_count(total: i64, page_size: u32) -> u32 {
    let size = i64::from(page_size.max(1));
    let pages = (total.max(0) + size - 1) / size;
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

/// Load one catalogue page for an active rubric.
///
/// # Errors
///
/// Returns `CatalogueError::Filter` for malformed segments and
/// `RepositoryError::NotFound` for an unknown or inactive rubric.
#[instrument(skip(pool))]
pub async fn load_page(
    pool: &PgPool,
    rubric_slug: &str,
    filter_path: &str,
    page_size: u32,
) -> Result<CataloguePage, CatalogueError> {
    let set = FilterSet::parse_path(filter_path)?;
    let rubrics = RubricRepository::new(pool);
    let rubric = rubrics.get_active_by_slug(rubric_slug).await?;
    let attributes = rubrics.filter_attributes(rubric.id).await?;

    let mut resolved = resolve::resolve(&set, &attributes);

    let shop_id = match resolved.canonical.shop().map(str::to_owned) {
        Some(slug) => match ShopRepository::new(pool).get_by_slug(&slug).await {
            Ok(shop) => Some(shop.id),
            Err(RepositoryError::NotFound) => {
                resolved.dropped.push(format!("shop-{slug}"));
                resolved.canonical.drop_shop();
                None
            }
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    if !resolved.dropped.is_empty() {
        debug!(dropped = ?resolved.dropped, "Ignoring unknown filter segments");
    }

    let set = resolved.canonical;
    let query = CatalogueQuery {
        rubric_id: rubric.id,
        filters: resolved.filters,
        price: set.price(),
        shop_id,
        sort_by: set.sort_by(),
        sort_dir: set.sort_dir(),
        page: set.page(),
        page_size,
    };

    let total: i64 = query
        .count()
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(RepositoryError::from)?;
    let products: Vec<CatalogueProduct> = query
        .products()
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(RepositoryError::from)?;

    let mut facets = Vec::with_capacity(attributes.len());
    for attribute in &attributes {
        let rows: Vec<(OptionId, i64)> = query
            .option_counts(attribute.attribute.id)
            .build_query_as()
            .fetch_all(pool)
            .await
            .map_err(RepositoryError::from)?;
        let counts: HashMap<OptionId, i64> = rows.into_iter().collect();
        let facet = build_facet(rubric.slug.as_str(), &set, attribute, &counts);
        if !facet.options.is_empty() {
            facets.push(facet);
        }
    }

    let bounds: (Option<Money>, Option<Money>) = query
        .price_bounds()
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(RepositoryError::from)?;
    let price = build_price_facet(rubric.slug.as_str(), &set, bounds);

    Ok(CataloguePage {
        path: set.path(rubric.slug.as_str()),
        page: set.page(),
        page_count: page_count(total, page_size),
        rubric,
        products,
        total,
        facets,
        price,
        dropped: resolved.dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 30), 1);
        assert_eq!(page_count(30, 30), 1);
        assert_eq!(page_count(31, 30), 2);
        assert_eq!(page_count(95, 30), 4);
        assert_eq!(page_count(5, 0), 5);
    }
}
