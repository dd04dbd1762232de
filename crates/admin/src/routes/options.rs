//! Options groups and options.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use agora_commerce::db::OptionsRepository;
use agora_commerce::db::options::{
    CatalogOption, OptionInput, OptionsGroup, OptionsGroupInput, OptionsGroupWithOptions,
};
use agora_core::{ApiResponse, OptionId, OptionsGroupId};

use crate::error::{Result, not_found};
use crate::middleware::{RequireAdminAuth, RequireCatalogueEditor};
use crate::state::AppState;

/// All options groups.
pub async fn list_groups(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<Json<Vec<OptionsGroup>>> {
    let groups = OptionsRepository::new(state.pool()).list_groups().await?;
    Ok(Json(groups))
}

/// One group with its options.
pub async fn show_group(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<OptionsGroupWithOptions>> {
    let group = OptionsRepository::new(state.pool())
        .get_group(OptionsGroupId::new(id))
        .await
        .map_err(not_found("Options group"))?;
    Ok(Json(group))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Json(input): Json<OptionsGroupInput>,
) -> Result<Json<ApiResponse<OptionsGroup>>> {
    let group = OptionsRepository::new(state.pool())
        .create_group(&input)
        .await?;
    Ok(Json(ApiResponse::ok_with("Options group created", group)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<OptionsGroupInput>,
) -> Result<Json<ApiResponse<OptionsGroup>>> {
    let group = OptionsRepository::new(state.pool())
        .update_group(OptionsGroupId::new(id), &input)
        .await
        .map_err(not_found("Options group"))?;
    Ok(Json(ApiResponse::ok_with("Options group updated", group)))
}

/// Delete a group. Refused while attributes use it.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    OptionsRepository::new(state.pool())
        .delete_group(OptionsGroupId::new(id))
        .await
        .map_err(not_found("Options group"))?;
    Ok(Json(ApiResponse::ok("Options group deleted")))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn add_option(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<OptionInput>,
) -> Result<Json<ApiResponse<CatalogOption>>> {
    let option = OptionsRepository::new(state.pool())
        .add_option(OptionsGroupId::new(id), &input)
        .await
        .map_err(not_found("Options group"))?;
    Ok(Json(ApiResponse::ok_with("Option added", option)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_option(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<OptionInput>,
) -> Result<Json<ApiResponse<CatalogOption>>> {
    let option = OptionsRepository::new(state.pool())
        .update_option(OptionId::new(id), &input)
        .await
        .map_err(not_found("Option"))?;
    Ok(Json(ApiResponse::ok_with("Option updated", option)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_option(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    OptionsRepository::new(state.pool())
        .delete_option(OptionId::new(id))
        .await
        .map_err(not_found("Option"))?;
    Ok(Json(ApiResponse::ok("Option deleted")))
}
