//! Rubric (catalogue section) management.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use agora_commerce::db::RubricRepository;
use agora_commerce::db::rubrics::{Rubric, RubricInput};
use agora_core::{ApiResponse, AttributesGroupId, RubricId};

use crate::error::{Result, not_found};
use crate::middleware::{RequireAdminAuth, RequireCatalogueEditor};
use crate::state::AppState;

/// A rubric and the attributes groups its products use.
#[derive(Debug, Serialize)]
pub struct RubricDetail {
    #[serde(flatten)]
    pub rubric: Rubric,
    pub attributes_group_ids: Vec<AttributesGroupId>,
}

/// All rubrics, active or not.
pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<Json<Vec<Rubric>>> {
    let rubrics = RubricRepository::new(state.pool()).list().await?;
    Ok(Json(rubrics))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<RubricDetail>> {
    let rubrics = RubricRepository::new(state.pool());
    let id = RubricId::new(id);
    let rubric = rubrics.get(id).await.map_err(not_found("Rubric"))?;
    let attributes_group_ids = rubrics.attributes_group_ids(id).await?;
    Ok(Json(RubricDetail {
        rubric,
        attributes_group_ids,
    }))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Json(input): Json<RubricInput>,
) -> Result<Json<ApiResponse<Rubric>>> {
    let rubric = RubricRepository::new(state.pool()).create(&input).await?;
    tracing::info!(rubric_id = %rubric.id, "Rubric created");
    Ok(Json(ApiResponse::ok_with("Rubric created", rubric)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
    Json(input): Json<RubricInput>,
) -> Result<Json<ApiResponse<Rubric>>> {
    let rubric = RubricRepository::new(state.pool())
        .update(RubricId::new(id), &input)
        .await
        .map_err(not_found("Rubric"))?;
    Ok(Json(ApiResponse::ok_with("Rubric updated", rubric)))
}

/// Delete a rubric. Refused while it has products or child rubrics.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse>> {
    RubricRepository::new(state.pool())
        .delete(RubricId::new(id))
        .await
        .map_err(not_found("Rubric"))?;
    tracing::info!(rubric_id = id, "Rubric deleted");
    Ok(Json(ApiResponse::ok("Rubric deleted")))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn attach_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path((id, group_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse>> {
    RubricRepository::new(state.pool())
        .attach_attributes_group(RubricId::new(id), AttributesGroupId::new(group_id))
        .await
        .map_err(not_found("Rubric"))?;
    Ok(Json(ApiResponse::ok("Attributes group attached")))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn detach_group(
    State(state): State<AppState>,
    RequireCatalogueEditor(admin): RequireCatalogueEditor,
    Path((id, group_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse>> {
    RubricRepository::new(state.pool())
        .detach_attributes_group(RubricId::new(id), AttributesGroupId::new(group_id))
        .await
        .map_err(not_found("Attributes group"))?;
    Ok(Json(ApiResponse::ok("Attributes group detached")))
}
