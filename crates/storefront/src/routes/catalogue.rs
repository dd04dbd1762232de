//! Rubric navigation and catalogue pages.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use tracing::instrument;

use agora_commerce::catalogue::{self, CataloguePage};
use agora_commerce::db::RubricRepository;
use agora_commerce::db::rubrics::Rubric;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Browsers and proxies may keep catalogue responses briefly.
const CATALOGUE_CACHE_CONTROL: &str = "public, max-age=60";

/// Active rubrics for the navigation, served from cache.
#[instrument(skip(state))]
pub async fn rubrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let pool = state.pool().clone();
    let rubrics = state
        .rubric_cache()
        .try_get_with((), async move {
            RubricRepository::new(&pool).list_active().await.map(Arc::new)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Failed to load rubrics: {e}")))?;

    Ok((
        [(header::CACHE_CONTROL, CATALOGUE_CACHE_CONTROL)],
        Json(Vec::<Rubric>::clone(&rubrics)),
    ))
}

/// Catalogue page without filters.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(rubric): Path<String>,
) -> Result<impl IntoResponse> {
    let page = load(&state, &rubric, "").await?;
    Ok(([(header::CACHE_CONTROL, CATALOGUE_CACHE_CONTROL)], Json(page)))
}

/// Catalogue page with filter segments, e.g. `/api/catalogue/wine/colour-red/price-10_50`.
#[instrument(skip(state))]
pub async fn show_filtered(
    State(state): State<AppState>,
    Path((rubric, filters)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let page = load(&state, &rubric, &filters).await?;
    Ok(([(header::CACHE_CONTROL, CATALOGUE_CACHE_CONTROL)], Json(page)))
}

async fn load(state: &AppState, rubric: &str, filters: &str) -> Result<CataloguePage> {
    let page = catalogue::load_page(
        state.pool(),
        rubric,
        filters,
        state.config().catalogue_page_size,
    )
    .await
    .map_err(|e| match e {
        catalogue::CatalogueError::Repository(
            agora_commerce::db::RepositoryError::NotFound,
        ) => AppError::NotFound("Rubric".to_string()),
        other => AppError::Catalogue(other),
    })?;

    if !page.dropped.is_empty() {
        tracing::debug!(dropped = ?page.dropped, path = %page.path, "Ignored filter segments");
    }
    Ok(page)
}
