//! Attributes groups and attributes.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use agora_commerce::db::AttributesRepository;
use agora_commerce::db::attributes::{
    Attribute, AttributeInput, AttributesGroup, AttributesGroupWithAttributes,
};
use agora_core::{ApiResponse, AttributeId, AttributesGroupId};

use crate::error::{Result, not_found};
use crate::middleware::{RequireAdminAuth, RequireCatalogueEditor};
use crate::state::AppState;

/// Group name body.
#[derive(Debug, Deserialize)]
pub struct GroupName {
    pub name: String,
}

/// All attributes groups.
pub async fn list_groups(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<Json<Vec<AttributesGroup>>> {
    let groups = AttributesRepository::new(state.pool()).list_groups().await?;
    Ok(Json(groups))
}

/// One group with its attributes.
pub async fn show_group(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<AttributesGroupWithAttributes>> {
    let group = AttributesRepository::new(state.pool())
        .get_group(AttributesGroupId::new(id))
        .await
        .map_err(not_found("Attributes group"))?;
    Ok(Json(group))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Json(body): Json<GroupName>,
) -> Result<Json<ApiResponse<AttributesGroup>>> {
    let group = AttributesRepository::new(state.pool())
        .create_group(&body.name)
        .await?;
    Ok(Json(ApiResponse::ok_with("Attributes group created", group)))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn rename_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(body): Json<GroupName>,
) -> Result<Json<ApiResponse<AttributesGroup>>> {
    let group = AttributesRepository::new(state.pool())
        .rename_group(AttributesGroupId::new(id), &body.name)
        .await
        .map_err(not_found("Attributes group"))?;
    Ok(Json(ApiResponse::ok_with("Attributes group renamed", group)))
}

/// Delete a group together with its attributes.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    AttributesRepository::new(state.pool())
        .delete_group(AttributesGroupId::new(id))
        .await
        .map_err(not_found("Attributes group"))?;
    Ok(Json(ApiResponse::ok("Attributes group deleted")))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn add_attribute(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<AttributeInput>,
) -> Result<Json<ApiResponse<Attribute>>> {
    let attribute = AttributesRepository::new(state.pool())
        .add_attribute(AttributesGroupId::new(id), &input)
        .await
        .map_err(not_found("Attributes group"))?;
    Ok(Json(ApiResponse::ok_with("Attribute added", attribute)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<Attribute>> {
    let attribute = AttributesRepository::new(state.pool())
        .get(AttributeId::new(id))
        .await
        .map_err(not_found("Attribute"))?;
    Ok(Json(attribute))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<AttributeInput>,
) -> Result<Json<ApiResponse<Attribute>>> {
    let attribute = AttributesRepository::new(state.pool())
        .update_attribute(AttributeId::new(id), &input)
        .await
        .map_err(not_found("Attribute"))?;
    Ok(Json(ApiResponse::ok_with("Attribute updated", attribute)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    AttributesRepository::new(state.pool())
        .delete_attribute(AttributeId::new(id))
        .await
        .map_err(not_found("Attribute"))?;
    Ok(Json(ApiResponse::ok("Attribute deleted")))
}
