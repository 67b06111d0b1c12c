//! Text-to-image similarity search.
//!
//! [`SearchEngine`] embeds a text query into the shared vector space, ranks
//! indexed images against it, and post-filters by a minimum score. Search is
//! read-only and safe to run while an indexing pass is writing.

use serde::Serialize;
use std::sync::Arc;

use pixie_embed::{EmbedError, EmbeddingProvider};

use crate::storage::{StoreError, VectorStore};

/// Errors raised by the query path.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// One search hit, ordered by descending score within a response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    pub score: f32,
    pub filename: String,
    pub relative_path: String,
    pub description: String,
}

/// A complete response to one query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub count: usize,
}

/// Ranks indexed images against natural-language queries.
pub struct SearchEngine {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl SearchEngine {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            collection: collection.into(),
        }
    }

    /// Embed the query, retrieve up to `top_k` nearest records, then drop
    /// hits scoring below `min_score`. An empty or whitespace-only query is
    /// rejected before touching the model or the store.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<SearchResponse, SearchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        tracing::debug!("Searching for: '{trimmed}' (top_k {top_k}, min_score {min_score})");
        let vector = self.provider.embed_text(trimmed).await?;
        let hits = self.store.search(&self.collection, &vector, top_k).await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .map(|hit| SearchResult {
                score: hit.score,
                filename: hit.payload.filename,
                relative_path: hit.payload.relative_path,
                description: hit.payload.description,
            })
            .collect();

        tracing::debug!("Query '{trimmed}' returned {} results", results.len());
        Ok(SearchResponse {
            query: trimmed.to_string(),
            count: results.len(),
            results,
        })
    }
}
