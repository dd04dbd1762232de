//! Full-text product search using Tantivy.
//!
//! The index lives in memory and is built from the database in the
//! background. The app starts immediately with an empty index; the builder
//! swaps a fresh index in at start-up and then on every reindex tick.

mod indexer;

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, ReloadPolicy, Term};
use tracing::instrument;

pub use indexer::{build_index, rebuild, spawn_reindexer};

/// Tokenizer used for product text.
pub(crate) const TEXT_TOKENIZER: &str = "product_text";

/// Upper bound on results per query.
pub const MAX_LIMIT: usize = 50;

const NAME_BOOST: f32 = 2.0;
const FUZZY_MIN_LENGTH: usize = 4;

/// A search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub item_id: String,
    pub rubric_name: String,
    pub rubric_slug: String,
    pub score: f32,
}

/// Schema field handles for the search index.
#[derive(Clone)]
pub struct SearchFields {
    // Stored fields (returned in results)
    pub id: Field,
    pub name: Field,
    pub slug: Field,
    pub rubric_name: Field,
    pub rubric_slug: Field,
    // Exact match on the article number
    pub item_id: Field,
    // Text fields for full-text search (indexed only)
    pub name_text: Field,
    pub description_text: Field,
}

/// Inner index state (once built).
struct ReadyIndex {
    index: Index,
    reader: IndexReader,
    fields: SearchFields,
}

/// The search index.
///
/// Starts empty and is populated asynchronously by a background task.
#[derive(Clone, Default)]
pub struct SearchIndex {
    inner: Arc<RwLock<Option<ReadyIndex>>>,
}

impl SearchIndex {
    /// Create a new empty search index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the index is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Swap in a freshly built index.
    pub(crate) fn set_ready(&self, index: Index, fields: SearchFields) -> Result<(), SearchError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::Index(format!("Failed to create reader: {e}")))?;

        let ready = ReadyIndex {
            index,
            reader,
            fields,
        };

        *self
            .inner
            .write()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))? = Some(ready);

        Ok(())
    }

    /// Build the schema for the search index.
    pub(crate) fn build_schema() -> (Schema, SearchFields) {
        use tantivy::schema::NumericOptions;

        let mut schema_builder = Schema::builder();

        let id = schema_builder.add_u64_field("id", NumericOptions::default().set_stored());
        let name = schema_builder.add_text_field("name", STORED);
        let slug = schema_builder.add_text_field("slug", STORED);
        let rubric_name = schema_builder.add_text_field("rubric_name", STORED);
        let rubric_slug = schema_builder.add_text_field("rubric_slug", STORED);
        // STRING means indexed but not tokenized (exact match)
        let item_id = schema_builder.add_text_field("item_id", STRING | STORED);

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer(TEXT_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        let name_text = schema_builder.add_text_field("name_text", text_options.clone());
        let description_text = schema_builder.add_text_field("description_text", text_options);

        let schema = schema_builder.build();
        let fields = SearchFields {
            id,
            name,
            slug,
            rubric_name,
            rubric_slug,
            item_id,
            name_text,
            description_text,
        };

        (schema, fields)
    }

    /// Search products by name, description or article number.
    ///
    /// Returns no hits while the index isn't ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned or the search fails.
    #[instrument(skip(self))]
    // The read guard must outlive `ready`, which borrows from it.
    #[allow(clippy::significant_drop_tightening)]
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let query_str = query_str.trim();
        if query_str.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_LIMIT);

        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        let Some(ready) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let query = build_query(ready, query_str)?;
        let searcher = ready.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher
                .doc::<tantivy::TantivyDocument>(doc_address)
                .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;
            hits.push(doc_to_hit(&ready.fields, &doc, score)?);
        }
        Ok(hits)
    }

    /// Get the number of documents in the index, or 0 if not ready.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| r.reader.searcher().num_docs()))
            .unwrap_or(0)
    }
}

/// Run the query text through the index tokenizer and combine exact, fuzzy
/// and prefix matches.
fn build_query(ready: &ReadyIndex, query_str: &str) -> Result<Box<dyn Query>, SearchError> {
    let fields = &ready.fields;
    let mut analyzer = ready
        .index
        .tokenizer_for_field(fields.name_text)
        .map_err(|e| SearchError::Query(format!("Tokenizer unavailable: {e}")))?;

    let mut tokens = Vec::new();
    let mut stream = analyzer.token_stream(query_str);
    stream.process(&mut |token| tokens.push(token.text.clone()));

    let mut subqueries: Vec<(Occur, Box<dyn Query>)> = vec![(
        Occur::Should,
        Box::new(TermQuery::new(
            Term::from_field_text(fields.item_id, query_str),
            IndexRecordOption::Basic,
        )),
    )];

    for token in &tokens {
        let name_term = Term::from_field_text(fields.name_text, token);
        let description_term = Term::from_field_text(fields.description_text, token);

        subqueries.push((
            Occur::Should,
            Box::new(BoostQuery::new(
                Box::new(TermQuery::new(name_term.clone(), IndexRecordOption::WithFreqs)),
                NAME_BOOST,
            )),
        ));
        subqueries.push((
            Occur::Should,
            Box::new(TermQuery::new(description_term, IndexRecordOption::WithFreqs)),
        ));

        if token.chars().count() >= FUZZY_MIN_LENGTH {
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(name_term, 1, true)),
            ));
        } else {
            // Short words are probably still being typed.
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new_prefix(name_term, 0, true)),
            ));
        }
    }

    Ok(Box::new(BooleanQuery::new(subqueries)))
}

fn doc_to_hit(
    fields: &SearchFields,
    doc: &tantivy::TantivyDocument,
    score: f32,
) -> Result<SearchHit, SearchError> {
    let get_text = |field: Field| -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let id = doc
        .get_first(fields.id)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| SearchError::Query("Document without id".to_string()))?;

    Ok(SearchHit {
        id,
        name: get_text(fields.name),
        slug: get_text(fields.slug),
        item_id: get_text(fields.item_id),
        rubric_name: get_text(fields.rubric_name),
        rubric_slug: get_text(fields.rubric_slug),
        score,
    })
}

/// Search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Index error: {0}")]
    Index(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Build error: {0}")]
    Build(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_commerce::db::products::SearchDocument;
    use agora_core::{ProductId, Slug};

    fn document(id: i32, name: &str, description: &str, item_id: &str) -> SearchDocument {
        SearchDocument {
            id: ProductId::new(id),
            name: name.to_string(),
            original_name: name.to_string(),
            slug: Slug::from_name(name, '-').unwrap(),
            description: description.to_string(),
            item_id: item_id.to_string(),
            rubric_name: "Wine".to_string(),
            rubric_slug: Slug::parse("wine").unwrap(),
        }
    }

    fn ready_index() -> SearchIndex {
        let docs = vec![
            document(1, "Chateau Margaux", "Dry red wine from Bordeaux", "000101"),
            document(2, "Riesling Kabinett", "Off-dry white wine from the Mosel", "000102"),
            document(3, "Brut Champagne", "Sparkling wine with fine bubbles", "000103"),
        ];
        let (index, fields) = build_index(&docs).unwrap();
        let search = SearchIndex::new();
        search.set_ready(index, fields).unwrap();
        search
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let search = SearchIndex::new();
        assert!(!search.is_ready());
        assert!(search.search("wine", 10).unwrap().is_empty());
        assert_eq!(search.num_docs(), 0);
    }

    #[test]
    fn test_search_by_name_and_description() {
        let search = ready_index();
        assert!(search.is_ready());
        assert_eq!(search.num_docs(), 3);

        let hits = search.search("riesling", 10).unwrap();
        assert_eq!(hits.first().map(|h| h.id), Some(2));

        let hits = search.search("bordeaux", 10).unwrap();
        assert_eq!(hits.first().map(|h| h.slug.as_str()), Some("chateau-margaux"));
    }

    #[test]
    fn test_search_tolerates_typos_and_prefixes() {
        let search = ready_index();
        let hits = search.search("champagme", 10).unwrap();
        assert_eq!(hits.first().map(|h| h.id), Some(3));

        let hits = search.search("ri", 10).unwrap();
        assert_eq!(hits.first().map(|h| h.id), Some(2));
    }

    #[test]
    fn test_search_by_item_id() {
        let search = ready_index();
        let hits = search.search("000103", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.first().map(|h| h.name.as_str()), Some("Brut Champagne"));
    }

    #[test]
    fn test_blank_query() {
        assert!(ready_index().search("   ", 10).unwrap().is_empty());
    }
}
