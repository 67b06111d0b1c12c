//! Storage abstraction layer for the image vector index.
//!
//! This module defines the [`VectorStore`] trait and its data types,
//! separating persistence from indexing and search logic so different
//! backends can sit behind one API.
//!
//! ## Key Components
//!
//! - **VectorStore**: collection management, upsert, similarity search, stats
//! - **ImageRecord**: one indexed image (id, vector, payload)
//! - **ScoredPoint**: a similarity-search hit
//!
//! A record's id is a pure function of the image's absolute path (blake3,
//! hex-encoded), which is what makes re-indexing idempotent: the same file
//! always overwrites its own record instead of duplicating it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod sqlite_store;

/// Similarity metric for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Cosine,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// File name including extension
    pub filename: String,
    /// Absolute path on disk
    pub path: String,
    /// Path relative to the configured image root
    pub relative_path: String,
    /// Sidecar description, or the "No description" sentinel
    pub description: String,
}

/// One indexed image: deterministic id, embedding vector, and payload.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ImagePayload,
}

/// A similarity-search hit, ordered by descending score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: ImagePayload,
}

/// Errors raised by vector store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error(
        "collection '{name}' exists with dimension {existing_dimension} and metric \
         {existing_metric}, requested dimension {requested_dimension} and metric \
         {requested_metric}"
    )]
    CollectionMismatch {
        name: String,
        existing_dimension: usize,
        existing_metric: String,
        requested_dimension: usize,
        requested_metric: String,
    },

    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("database error: {source}")]
    Database {
        #[from]
        source: sqlx::Error,
    },
}

/// Persistent collection of (id, vector, payload) records with
/// similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the named collection if absent; no-op if it already exists
    /// with the same dimension and metric, error on a mismatch.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: Metric,
    ) -> Result<(), StoreError>;

    /// Write or overwrite records by id. Each record is written atomically;
    /// the batch as a whole makes no atomicity promise.
    async fn upsert(&self, collection: &str, records: &[ImageRecord]) -> Result<(), StoreError>;

    /// Return up to `limit` records ordered by descending similarity to the
    /// query vector. Fails if the collection does not exist.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Number of records in the collection; 0 if it is empty or absent.
    async fn stats(&self, collection: &str) -> Result<usize, StoreError>;
}

/// Deterministic record id for an image file: blake3 of the absolute path,
/// hex-encoded. Stable across runs and processes.
pub fn record_id(absolute_path: &Path) -> String {
    blake3::hash(absolute_path.to_string_lossy().as_bytes())
        .to_hex()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_record_id_is_stable() {
        let path = PathBuf::from("/images/vacation/beach.jpg");
        let a = record_id(&path);
        let b = record_id(&path);

        assert_eq!(a, b);
        assert_eq!(a.len(), 64, "blake3 hex digest is 64 chars");
        assert_ne!(a, record_id(&PathBuf::from("/images/vacation/beach2.jpg")));
    }

    #[test]
    fn test_record_id_depends_on_full_path() {
        // Same filename under different directories must not collide
        let a = record_id(&PathBuf::from("/images/a/cat.jpg"));
        let b = record_id(&PathBuf::from("/images/b/cat.jpg"));
        assert_ne!(a, b);
    }
}
