//! Product card.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use agora_commerce::db::connections::ConnectionWithProducts;
use agora_commerce::db::products::{CardAttribute, Product, ShopOffer};
use agora_commerce::db::rubrics::Rubric;
use agora_commerce::db::{
    ConnectionRepository, ProductRepository, RepositoryError, RubricRepository,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Everything the product card shows.
#[derive(Debug, Serialize)]
pub struct ProductCard {
    #[serde(flatten)]
    pub product: Product,
    pub rubric: Rubric,
    pub attributes: Vec<CardAttribute>,
    /// Shops selling the product, cheapest first.
    pub offers: Vec<ShopOffer>,
    /// Variant groups the product belongs to.
    pub connections: Vec<ConnectionWithProducts>,
}

/// Show an active product and count the view.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductCard>> {
    let pool = state.pool();
    let products = ProductRepository::new(pool);

    let product = products.get_active_by_slug(&slug).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound("Product".to_string()),
        other => AppError::Database(other),
    })?;

    let rubric = RubricRepository::new(pool).get(product.rubric_id).await?;
    let attributes = products.card_attributes(product.id).await?;
    let offers = products.offers(product.id).await?;
    let connections = ConnectionRepository::new(pool)
        .for_product(product.id)
        .await?;

    if let Err(e) = products.increment_views(product.id).await {
        tracing::warn!(product_id = %product.id, error = %e, "Failed to count product view");
    }

    Ok(Json(ProductCard {
        product,
        rubric,
        attributes,
        offers,
        connections,
    }))
}
