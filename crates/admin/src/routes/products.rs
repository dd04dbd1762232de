//! Product management: products, attribute values, shop stock, variant
//! connections and description uniqueness.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use agora_commerce::db::connections::{ConnectionWithProducts, RemovalOutcome};
use agora_commerce::db::products::{
    AttributeValue, Product, ProductAttribute, ProductInput, ProductListFilter, ShopProduct,
    ShopProductInput,
};
use agora_commerce::db::{ConnectionRepository, ProductRepository};
use agora_core::{ApiResponse, AttributeId, ConnectionId, ProductId, ShopId};

use crate::error::{AppError, Result, not_found};
use crate::middleware::{RequireAdminAuth, RequireCatalogueEditor, RequireOrderManager};
use crate::routes::Page;
use crate::services::{PollOutcome, UniquenessClient};
use crate::state::AppState;

/// A product with everything the edit screen shows.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub attributes: Vec<ProductAttribute>,
    pub shop_products: Vec<ShopProduct>,
    pub connections: Vec<ConnectionWithProducts>,
}

/// Body for starting a variant connection.
#[derive(Debug, Deserialize)]
pub struct NewConnection {
    pub attribute_id: AttributeId,
}

/// Body for adding a product to a connection.
#[derive(Debug, Deserialize)]
pub struct ConnectionMember {
    pub product_id: ProductId,
}

/// Submitted text id.
#[derive(Debug, Serialize)]
pub struct UniquenessSubmitted {
    pub text_uid: String,
}

/// Poll result together with the product as stored after it.
#[derive(Debug, Serialize)]
pub struct UniquenessReport {
    pub outcome: PollOutcome,
    pub product: Product,
}

// =============================================================================
// Products
// =============================================================================

/// Products, newest first, optionally by rubric or search text.
pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(filter): Query<ProductListFilter>,
) -> Result<Json<Page<Product>>> {
    let (items, total) = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(Page::new(items, total, filter.page)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<ProductDetail>> {
    let id = ProductId::new(id);
    let products = ProductRepository::new(state.pool());
    let product = products.get(id).await.map_err(not_found("Product"))?;
    let attributes = products.attributes(id).await?;
    let shop_products = products.shop_products(id).await?;
    let connections = ConnectionRepository::new(state.pool())
        .for_product(id)
        .await?;

    Ok(Json(ProductDetail {
        product,
        attributes,
        shop_products,
        connections,
    }))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Json(input): Json<ProductInput>,
) -> Result<Json<ApiResponse<Product>>> {
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    tracing::info!(product_id = %product.id, item_id = %product.item_id, "Product created");
    Ok(Json(ApiResponse::ok_with("Product created", product)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ApiResponse<Product>>> {
    let product = ProductRepository::new(state.pool())
        .update(ProductId::new(id), &input)
        .await
        .map_err(not_found("Product"))?;
    Ok(Json(ApiResponse::ok_with("Product updated", product)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await
        .map_err(not_found("Product"))?;
    tracing::info!(product_id = id, "Product deleted");
    Ok(Json(ApiResponse::ok("Product deleted")))
}

// =============================================================================
// Attribute values
// =============================================================================

#[instrument(skip(state, admin, value), fields(admin_id = %admin.id))]
pub async fn set_attribute(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path((id, attribute_id)): Path<(i32, i32)>,
    Json(value): Json<AttributeValue>,
) -> Result<Json<ApiResponse<ProductAttribute>>> {
    let stored = ProductRepository::new(state.pool())
        .set_attribute(ProductId::new(id), AttributeId::new(attribute_id), value)
        .await
        .map_err(not_found("Product or attribute"))?;
    Ok(Json(ApiResponse::ok_with("Attribute value saved", stored)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn remove_attribute(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path((id, attribute_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse>> {
    ProductRepository::new(state.pool())
        .remove_attribute(ProductId::new(id), AttributeId::new(attribute_id))
        .await
        .map_err(not_found("Attribute value"))?;
    Ok(Json(ApiResponse::ok("Attribute value removed")))
}

// =============================================================================
// Shop stock
// =============================================================================

pub async fn shop_products(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ShopProduct>>> {
    let id = ProductId::new(id);
    let products = ProductRepository::new(state.pool());
    products.get(id).await.map_err(not_found("Product"))?;
    Ok(Json(products.shop_products(id).await?))
}

/// Set a shop's price and stock for the product.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn upsert_shop_product(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path((id, shop_id)): Path<(i32, i32)>,
    Json(input): Json<ShopProductInput>,
) -> Result<Json<ApiResponse<ShopProduct>>> {
    let shop_product = ProductRepository::new(state.pool())
        .upsert_shop_product(ProductId::new(id), ShopId::new(shop_id), &input)
        .await
        .map_err(not_found("Product or shop"))?;
    Ok(Json(ApiResponse::ok_with("Shop price saved", shop_product)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_shop_product(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path((id, shop_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse>> {
    ProductRepository::new(state.pool())
        .delete_shop_product(ProductId::new(id), ShopId::new(shop_id))
        .await
        .map_err(not_found("Shop product"))?;
    Ok(Json(ApiResponse::ok("Product withdrawn from shop")))
}

// =============================================================================
// Variant connections
// =============================================================================

/// Start a connection keyed by a select attribute, with this product as
/// the first member.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create_connection(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(body): Json<NewConnection>,
) -> Result<Json<ApiResponse<ConnectionWithProducts>>> {
    let connection = ConnectionRepository::new(state.pool())
        .create(ProductId::new(id), body.attribute_id)
        .await
        .map_err(not_found("Product or attribute"))?;
    Ok(Json(ApiResponse::ok_with("Connection created", connection)))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn add_to_connection(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(body): Json<ConnectionMember>,
) -> Result<Json<ApiResponse<ConnectionWithProducts>>> {
    let connection = ConnectionRepository::new(state.pool())
        .add_product(ConnectionId::new(id), body.product_id)
        .await
        .map_err(not_found("Connection or product"))?;
    Ok(Json(ApiResponse::ok_with(
        "Product added to connection",
        connection,
    )))
}

/// Remove a product from a connection. The last member takes the
/// connection with it.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn remove_from_connection(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path((id, product_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<RemovalOutcome>>> {
    let outcome = ConnectionRepository::new(state.pool())
        .remove_product(ConnectionId::new(id), ProductId::new(product_id))
        .await
        .map_err(not_found("Connection member"))?;
    let message = match outcome {
        RemovalOutcome::Kept => "Product removed from connection",
        RemovalOutcome::Deleted => "Connection deleted",
    };
    Ok(Json(ApiResponse::ok_with(message, outcome)))
}

// =============================================================================
// Description uniqueness
// =============================================================================

fn uniqueness_client(state: &AppState) -> Result<&UniquenessClient> {
    state
        .uniqueness()
        .ok_or_else(|| AppError::BadRequest("Uniqueness checking is not configured".to_string()))
}

/// Send the product description to the checker.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn submit_uniqueness(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UniquenessSubmitted>>> {
    let client = uniqueness_client(&state)?;
    let products = ProductRepository::new(state.pool());
    let product = products
        .get(ProductId::new(id))
        .await
        .map_err(not_found("Product"))?;

    let text_uid = client.submit(&product.description).await?;
    products.set_uniqueness_text_id(product.id, &text_uid).await?;

    Ok(Json(ApiResponse::ok_with(
        "Description submitted for uniqueness check",
        UniquenessSubmitted { text_uid },
    )))
}

/// Ask the checker for the result and store it when ready.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn poll_uniqueness(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UniquenessReport>>> {
    let client = uniqueness_client(&state)?;
    let products = ProductRepository::new(state.pool());
    let product = products
        .get(ProductId::new(id))
        .await
        .map_err(not_found("Product"))?;
    let text_uid = product.uniqueness_text_id.as_deref().ok_or_else(|| {
        AppError::BadRequest("Description has not been submitted for checking".to_string())
    })?;

    let outcome = client.poll(text_uid).await?;
    let (message, product) = match outcome {
        PollOutcome::Pending => ("Uniqueness check is still running", product),
        PollOutcome::Done(percent) => {
            let stored = products.store_uniqueness(product.id, percent).await?;
            tracing::info!(product_id = %stored.id, %percent, "Uniqueness stored");
            ("Uniqueness stored", stored)
        }
    };

    Ok(Json(ApiResponse::ok_with(
        message,
        UniquenessReport { outcome, product },
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_body() {
        let value: AttributeValue =
            serde_json::from_str(r#"{"kind": "options", "value": [4, 9]}"#).unwrap();
        assert_eq!(
            value,
            AttributeValue::Options(vec![agora_core::OptionId::new(4), agora_core::OptionId::new(9)])
        );
    }

    #[test]
    fn test_connection_bodies() {
        let body: NewConnection = serde_json::from_str(r#"{"attribute_id": 12}"#).unwrap();
        assert_eq!(body.attribute_id, AttributeId::new(12));
        let body: ConnectionMember = serde_json::from_str(r#"{"product_id": 40}"#).unwrap();
        assert_eq!(body.product_id, ProductId::new(40));
    }

    #[test]
    fn test_list_filter_from_query() {
        let Query(filter): Query<ProductListFilter> =
            Query::try_from_uri(&"/api/products?rubric_id=3&search=merlot&page=2".parse().unwrap())
                .unwrap();
        assert_eq!(filter.rubric_id, Some(agora_core::RubricId::new(3)));
        assert_eq!(filter.search.as_deref(), Some("merlot"));
        assert_eq!(filter.page, 2);
    }
}
