//! Product search.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::search::SearchHit;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 10;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

/// Search products by name, description or article number.
///
/// Returns an empty list while the index is still being built.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>> {
    let hits = state
        .search()
        .search(&query.q, query.limit.unwrap_or(DEFAULT_LIMIT))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(hits))
}
