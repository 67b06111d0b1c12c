//! Service configuration.

use pixie_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the image search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory of the image tree to index and serve from
    pub root_dir: PathBuf,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Collection name within the store
    pub collection: String,
    /// Extension allow-list, lowercase, without the leading dot
    pub image_extensions: Vec<String>,
    /// Images embedded and upserted per batch
    pub batch_size: usize,
    /// Result limit applied when a query does not specify one
    pub default_limit: usize,
    /// Hard cap on requested result limits
    pub max_limit: usize,
    /// Embedding model configuration
    pub embed: EmbedConfig,
}

impl ServiceConfig {
    /// Defaults rooted at the given image directory. State (database and
    /// model cache) lives under a `.pixie` subdirectory of the root.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let state_dir = root_dir.join(".pixie");
        Self {
            db_path: state_dir.join("index.db"),
            collection: "images".to_string(),
            image_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            batch_size: 128,
            default_limit: 48,
            max_limit: 200,
            embed: EmbedConfig::clip_vit_b32(state_dir.join("models")),
            root_dir,
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_image_extensions(mut self, extensions: Vec<String>) -> Self {
        self.image_extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    pub fn with_embed(mut self, embed: EmbedConfig) -> Self {
        self.embed = embed;
        self
    }

    /// Whether a file extension is on the allow-list. Comparison is
    /// case-insensitive, so `photo.PNG` matches `png`.
    pub fn matches_extension(&self, extension: &str) -> bool {
        let lowered = extension.to_ascii_lowercase();
        self.image_extensions.iter().any(|e| *e == lowered)
    }
}
