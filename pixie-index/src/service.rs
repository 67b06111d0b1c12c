//! Service facade composing embedding, storage, indexing, and search.
//!
//! [`ImageSearchService`] is the single entry point adapters talk to. It owns
//! the shared provider/store/tracker wiring, validates inputs at the
//! boundary, and keeps file serving contained inside the configured root.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use pixie_embed::{ClipEmbedProvider, EmbeddingProvider};

use crate::config::ServiceConfig;
use crate::indexing::{IndexingCoordinator, IndexingStatus, RunOutcome, StatusTracker};
use crate::search::{SearchEngine, SearchError, SearchResponse};
use crate::storage::{Metric, VectorStore, sqlite_store::SqliteVectorStore};

/// Result of requesting a background indexing run.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A run was dispatched; the status snapshot reflects its start.
    Started(IndexingStatus),
    /// A run already held the slot; the snapshot shows its progress.
    AlreadyRunning(IndexingStatus),
}

/// Errors raised when resolving an image path for serving.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("image not found: {path}")]
    NotFound { path: String },

    #[error("path escapes the image root: {path}")]
    OutsideRoot { path: String },
}

/// Health and size summary of the service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub total_images: usize,
    pub model: String,
    pub device: String,
    pub model_loaded: bool,
    pub is_indexing: bool,
}

/// The image search service: index a directory tree, answer text queries.
pub struct ImageSearchService {
    config: ServiceConfig,
    root: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    tracker: Arc<StatusTracker>,
    coordinator: Arc<IndexingCoordinator>,
    engine: SearchEngine,
}

impl ImageSearchService {
    /// Wire a service from explicit provider and store instances. The
    /// configured root must exist; the collection is created on first use.
    pub async fn new(
        config: ServiceConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let root = tokio::fs::canonicalize(&config.root_dir)
            .await
            .with_context(|| {
                format!("image root does not exist: {}", config.root_dir.display())
            })?;

        store
            .ensure_collection(&config.collection, provider.embedding_dimension(), Metric::Cosine)
            .await?;

        let tracker = Arc::new(StatusTracker::new());
        let coordinator = Arc::new(IndexingCoordinator::new(
            &config,
            Arc::clone(&provider),
            Arc::clone(&store),
            Arc::clone(&tracker),
        ));
        let engine = SearchEngine::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            config.collection.clone(),
        );

        Ok(Self {
            config,
            root,
            provider,
            store,
            tracker,
            coordinator,
            engine,
        })
    }

    /// Build the production service: CLIP provider plus the on-disk SQLite
    /// store, creating state directories as needed.
    pub async fn create(config: ServiceConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let provider = ClipEmbedProvider::create(config.embed.clone())
            .await
            .context("failed to initialize embedding models")?;
        let store = SqliteVectorStore::open(&config.db_path)
            .await
            .with_context(|| format!("failed to open database: {}", config.db_path.display()))?;

        Self::new(config, Arc::new(provider), Arc::new(store)).await
    }

    /// Dispatch a background indexing run over `dir` (or the configured
    /// root). Validates the directory before touching the run slot, so a bad
    /// request never blocks a later one.
    pub async fn start_indexing(&self, dir: Option<&Path>) -> Result<StartOutcome> {
        let target = self.validate_dir(dir).await?;
        if self.coordinator.start(target) {
            Ok(StartOutcome::Started(self.tracker.snapshot()))
        } else {
            Ok(StartOutcome::AlreadyRunning(self.tracker.snapshot()))
        }
    }

    /// Run an indexing pass to completion on the caller's task.
    pub async fn run_indexing(&self, dir: Option<&Path>) -> Result<RunOutcome> {
        let target = self.validate_dir(dir).await?;
        self.coordinator.run(&target).await
    }

    /// Snapshot of indexing progress.
    pub fn indexing_status(&self) -> IndexingStatus {
        self.tracker.snapshot()
    }

    /// Search indexed images. A missing limit falls back to the configured
    /// default; any limit is capped at the configured maximum.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        min_score: f32,
    ) -> Result<SearchResponse, SearchError> {
        let top_k = self.clamp_limit(limit);
        self.engine.search(query, top_k, min_score).await
    }

    /// Health and size summary.
    pub async fn stats(&self) -> Result<ServiceStats> {
        let total_images = self.store.stats(&self.config.collection).await?;
        Ok(ServiceStats {
            total_images,
            model: self.provider.provider_name().to_string(),
            device: self.provider.device().to_string(),
            model_loaded: self.provider.is_ready(),
            is_indexing: self.tracker.snapshot().is_indexing,
        })
    }

    /// Resolve a relative image path to an absolute one inside the root.
    /// Rejects traversal and symlink escapes regardless of whether the
    /// target exists.
    pub async fn resolve_image(&self, relative_path: &str) -> Result<PathBuf, ServeError> {
        let requested = Path::new(relative_path);
        let escapes_lexically = requested.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes_lexically {
            return Err(ServeError::OutsideRoot {
                path: relative_path.to_string(),
            });
        }

        let candidate = self.root.join(requested);
        let resolved =
            tokio::fs::canonicalize(&candidate)
                .await
                .map_err(|_| ServeError::NotFound {
                    path: relative_path.to_string(),
                })?;

        if !resolved.starts_with(&self.root) {
            return Err(ServeError::OutsideRoot {
                path: relative_path.to_string(),
            });
        }
        Ok(resolved)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit)
    }

    async fn validate_dir(&self, dir: Option<&Path>) -> Result<PathBuf> {
        let target = dir.unwrap_or(&self.config.root_dir);
        let canonical = tokio::fs::canonicalize(target)
            .await
            .with_context(|| format!("directory does not exist: {}", target.display()))?;
        if !tokio::fs::metadata(&canonical).await?.is_dir() {
            bail!("not a directory: {}", canonical.display());
        }
        Ok(canonical)
    }
}
