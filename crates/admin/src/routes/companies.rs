//! Tenant management: companies and their shops.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use agora_commerce::db::companies::{Company, CompanyInput, Shop, ShopInput};
use agora_commerce::db::{CompanyRepository, ShopRepository};
use agora_core::{ApiResponse, CompanyId, ShopId};

use crate::error::{Result, not_found};
use crate::middleware::{RequireAdminAuth, RequireOrderManager};
use crate::state::AppState;

// =============================================================================
// Companies
// =============================================================================

/// All companies.
pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<Json<Vec<Company>>> {
    let companies = CompanyRepository::new(state.pool()).list().await?;
    Ok(Json(companies))
}

/// One company.
pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<Company>> {
    let company = CompanyRepository::new(state.pool())
        .get(CompanyId::new(id))
        .await
        .map_err(not_found("Company"))?;
    Ok(Json(company))
}

/// Create a company.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Json(input): Json<CompanyInput>,
) -> Result<Json<ApiResponse<Company>>> {
    let company = CompanyRepository::new(state.pool()).create(&input).await?;
    tracing::info!(company_id = %company.id, "Company created");
    Ok(Json(ApiResponse::ok_with("Company created", company)))
}

/// Update a company.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path(id): Path<i32>,
    Json(input): Json<CompanyInput>,
) -> Result<Json<ApiResponse<Company>>> {
    let company = CompanyRepository::new(state.pool())
        .update(CompanyId::new(id), &input)
        .await
        .map_err(not_found("Company"))?;
    Ok(Json(ApiResponse::ok_with("Company updated", company)))
}

/// Delete a company. Refused while it still has shops.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    CompanyRepository::new(state.pool())
        .delete(CompanyId::new(id))
        .await
        .map_err(not_found("Company"))?;
    tracing::info!(company_id = id, "Company deleted");
    Ok(Json(ApiResponse::ok("Company deleted")))
}

// =============================================================================
// Shops
// =============================================================================

/// Shops of a company.
pub async fn shops(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Shop>>> {
    let company_id = CompanyId::new(id);
    CompanyRepository::new(state.pool())
        .get(company_id)
        .await
        .map_err(not_found("Company"))?;
    let shops = ShopRepository::new(state.pool())
        .list_by_company(company_id)
        .await?;
    Ok(Json(shops))
}

/// Open a shop for a company.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create_shop(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path(id): Path<i32>,
    Json(input): Json<ShopInput>,
) -> Result<Json<ApiResponse<Shop>>> {
    let shop = ShopRepository::new(state.pool())
        .create(CompanyId::new(id), &input)
        .await
        .map_err(not_found("Company"))?;
    tracing::info!(shop_id = %shop.id, "Shop created");
    Ok(Json(ApiResponse::ok_with("Shop created", shop)))
}

/// One shop.
pub async fn show_shop(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<Shop>> {
    let shop = ShopRepository::new(state.pool())
        .get(ShopId::new(id))
        .await
        .map_err(not_found("Shop"))?;
    Ok(Json(shop))
}

/// Update a shop.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_shop(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path(id): Path<i32>,
    Json(input): Json<ShopInput>,
) -> Result<Json<ApiResponse<Shop>>> {
    let shop = ShopRepository::new(state.pool())
        .update(ShopId::new(id), &input)
        .await
        .map_err(not_found("Shop"))?;
    Ok(Json(ApiResponse::ok_with("Shop updated", shop)))
}

/// Delete a shop and its stock.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_shop(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    ShopRepository::new(state.pool())
        .delete(ShopId::new(id))
        .await
        .map_err(not_found("Shop"))?;
    tracing::info!(shop_id = id, "Shop deleted");
    Ok(Json(ApiResponse::ok("Shop deleted")))
}
