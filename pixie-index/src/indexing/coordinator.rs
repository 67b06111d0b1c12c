//! Indexing run orchestration.
//!
//! [`IndexingCoordinator`] drives one end-to-end pass over an image tree:
//! discover files, embed them in fixed-size batches, upsert into the vector
//! store, and publish progress through the shared [`StatusTracker`]. At most
//! one run is ever active; the tracker's `try_begin` is the gate.
//!
//! Record ids derive from absolute paths, so re-running over the same tree
//! overwrites records in place rather than accumulating duplicates. A batch
//! that fails to embed or upsert is counted and skipped; internal failures
//! never abort the run.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pixie_embed::EmbeddingProvider;

use crate::config::ServiceConfig;
use crate::indexing::status::StatusTracker;
use crate::storage::{ImagePayload, ImageRecord, VectorStore, record_id};

/// Sidecar description used when no `<stem>.txt` file is present.
pub const NO_DESCRIPTION: &str = "No description";

/// Result of an indexing run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run completed; `indexed + errors` equals the number of discovered
    /// images.
    Completed { indexed: usize, errors: usize },
    /// Another run already held the slot; nothing was done.
    AlreadyRunning,
}

/// Orchestrates indexing runs over a directory tree.
pub struct IndexingCoordinator {
    collection: String,
    extensions: Vec<String>,
    batch_size: usize,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    tracker: Arc<StatusTracker>,
}

impl IndexingCoordinator {
    pub fn new(
        config: &ServiceConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        tracker: Arc<StatusTracker>,
    ) -> Self {
        Self {
            collection: config.collection.clone(),
            extensions: config.image_extensions.clone(),
            batch_size: config.batch_size.max(1),
            provider,
            store,
            tracker,
        }
    }

    /// Run an indexing pass to completion, claiming the single run slot
    /// first. A held slot is reported as [`RunOutcome::AlreadyRunning`],
    /// not as an error.
    pub async fn run(&self, root: &Path) -> Result<RunOutcome> {
        if !self.tracker.try_begin(0) {
            tracing::info!("Indexing already in progress, ignoring request");
            return Ok(RunOutcome::AlreadyRunning);
        }

        match self.run_inner(root).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.tracker.finish(format!("Indexing failed: {error:#}"));
                Err(error)
            }
        }
    }

    /// Dispatch a run onto a detached background task. Returns false without
    /// spawning if a run is already active. Progress is observable through
    /// the shared tracker.
    pub fn start(self: &Arc<Self>, root: PathBuf) -> bool {
        if !self.tracker.try_begin(0) {
            tracing::info!("Indexing already in progress, ignoring request");
            return false;
        }

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = coordinator.run_inner(&root).await {
                tracing::error!("Background indexing run failed: {error:#}");
                coordinator
                    .tracker
                    .finish(format!("Indexing failed: {error:#}"));
            }
        });
        true
    }

    // Assumes the run slot is held; always releases it via `finish`
    // unless discovery itself errors (the callers handle that path).
    async fn run_inner(&self, root: &Path) -> Result<RunOutcome> {
        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("invalid image directory: {}", root.display()))?;

        tracing::info!("Starting indexing run over {}", root.display());
        let images = self.discover_images(&root).await?;
        let total = images.len();
        self.tracker
            .update(0, total, format!("Found {total} images."));
        tracing::info!("Found {} images under {}", total, root.display());

        let mut indexed = 0usize;
        let mut errors = 0usize;
        let mut processed = 0usize;

        for batch in images.chunks(self.batch_size) {
            match self.index_batch(&root, batch).await {
                Ok(()) => indexed += batch.len(),
                Err(error) => {
                    errors += batch.len();
                    tracing::warn!(
                        "Skipping batch of {} starting at {}: {error:#}",
                        batch.len(),
                        batch[0].display()
                    );
                }
            }
            processed += batch.len();
            self.tracker.update(
                processed,
                total,
                format!("Processed {processed}/{total} images"),
            );
        }

        let summary = if errors > 0 {
            format!("Completed! Indexed {indexed} images. ({errors} errors)")
        } else {
            format!("Completed! Indexed {indexed} images.")
        };
        tracing::info!("{summary}");
        self.tracker.finish(summary);

        Ok(RunOutcome::Completed { indexed, errors })
    }

    /// Embed one batch and upsert the resulting records.
    async fn index_batch(&self, root: &Path, batch: &[PathBuf]) -> Result<()> {
        let vectors = self.provider.embed_images(batch).await?;

        let mut records = Vec::with_capacity(batch.len());
        for (path, vector) in batch.iter().zip(vectors) {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();

            records.push(ImageRecord {
                id: record_id(path),
                vector,
                payload: ImagePayload {
                    filename,
                    path: path.to_string_lossy().into_owned(),
                    relative_path,
                    description: read_sidecar_description(path).await,
                },
            });
        }

        self.store.upsert(&self.collection, &records).await?;
        tracing::debug!("Indexed batch of {} images", records.len());
        Ok(())
    }

    /// Walk the tree collecting allow-listed image files, sorted by path so
    /// batch composition is deterministic.
    async fn discover_images(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("failed to read directory: {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && self.matches_extension(&path) {
                    images.push(path);
                }
            }
        }

        images.sort();
        Ok(images)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let lowered = ext.to_string_lossy().to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == lowered)
            })
            .unwrap_or(false)
    }
}

/// Read the `<stem>.txt` sidecar next to an image. Missing or unreadable
/// sidecars fall back to the "No description" sentinel.
async fn read_sidecar_description(image_path: &Path) -> String {
    let sidecar = image_path.with_extension("txt");
    match tokio::fs::read_to_string(&sidecar).await {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                NO_DESCRIPTION.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => NO_DESCRIPTION.to_string(),
    }
}
