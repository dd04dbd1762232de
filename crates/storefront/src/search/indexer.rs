//! Search index builder.
//!
//! Builds the index from active products and keeps it fresh by rebuilding
//! on a fixed interval.

use std::time::Duration;

use sqlx::PgPool;
use tantivy::{Index, doc};
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer,
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use agora_commerce::db::ProductRepository;
use agora_commerce::db::products::SearchDocument;

use super::{SearchError, SearchFields, SearchIndex, TEXT_TOKENIZER};

/// Writer memory budget.
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Spawn a background task that builds the index now and then every
/// `interval`.
///
/// Until the first build completes, `SearchIndex::search()` returns no hits.
/// A failed rebuild keeps serving the previous index.
pub fn spawn_reindexer(search_index: SearchIndex, pool: PgPool, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Spawning search reindex task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = rebuild(&search_index, &pool).await {
                error!(error = %e, "Failed to rebuild search index");
            }
        }
    });
}

/// Load products from the database and swap in a fresh index.
///
/// # Errors
///
/// Returns `SearchError::Build` if loading or indexing fails.
#[instrument(skip_all)]
pub async fn rebuild(search_index: &SearchIndex, pool: &PgPool) -> Result<(), SearchError> {
    let docs = ProductRepository::new(pool)
        .search_documents()
        .await
        .map_err(|e| SearchError::Build(format!("Failed to load products: {e}")))?;

    let (index, fields) = tokio::task::spawn_blocking(move || build_index(&docs))
        .await
        .map_err(|e| SearchError::Build(format!("Index build task failed: {e}")))??;

    search_index.set_ready(index, fields)?;
    info!(docs = search_index.num_docs(), "Search index is ready");
    Ok(())
}

/// Build an in-memory index over `docs`.
///
/// # Errors
///
/// Returns `SearchError::Build` if the writer cannot be created or the
/// commit fails.
pub fn build_index(docs: &[SearchDocument]) -> Result<(Index, SearchFields), SearchError> {
    let (schema, fields) = SearchIndex::build_schema();
    let index = Index::create_in_ram(schema);

    index.tokenizers().register(
        TEXT_TOKENIZER,
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build(),
    );

    let mut writer = index
        .writer(WRITER_HEAP_BYTES)
        .map_err(|e| SearchError::Build(format!("Failed to create writer: {e}")))?;

    for doc in docs {
        let Ok(id) = u64::try_from(doc.id.as_i32()) else {
            continue;
        };
        let name_text = if doc.original_name.is_empty() || doc.original_name == doc.name {
            doc.name.clone()
        } else {
            format!("{} {}", doc.name, doc.original_name)
        };

        writer
            .add_document(tantivy::doc!(
                fields.id => id,
                fields.name => doc.name.as_str(),
                fields.slug => doc.slug.as_str(),
                fields.rubric_name => doc.rubric_name.as_str(),
                fields.rubric_slug => doc.rubric_slug.as_str(),
                fields.item_id => doc.item_id.as_str(),
                fields.name_text => name_text,
                fields.description_text => doc.description.as_str(),
            ))
            .map_err(|e| SearchError::Build(format!("Failed to add document: {e}")))?;
    }

    writer
        .commit()
        .map_err(|e| SearchError::Build(format!("Failed to commit index: {e}")))?;

    Ok((index, fields))
}
