//! Configuration for embedding models

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the CLIP embedding provider.
///
/// Text and image models are loaded as a pair so that both sides of the
/// cross-modal search share one embedding space. The defaults select
/// CLIP ViT-B/32, which fastembed ships as matching text and vision ONNX
/// models with 512-dimensional output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Name of the embedding model pair to use
    pub model_name: String,
    /// Directory where downloaded model files are cached
    pub cache_dir: PathBuf,
    /// Maximum batch size passed to the underlying model
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings after generation
    pub normalize: bool,
}

impl EmbedConfig {
    /// Create a configuration for the default CLIP ViT-B/32 model pair,
    /// caching model files under the given directory.
    pub fn clip_vit_b32<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            model_name: "clip-vit-b-32".to_string(),
            cache_dir: cache_dir.as_ref().to_path_buf(),
            batch_size: 32,
            normalize: true,
        }
    }

    /// Default configuration rooted at the given cache directory.
    pub fn default_with_path<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self::clip_vit_b32(cache_dir)
    }

    /// Set the maximum batch size for embedding generation.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set whether embeddings are L2-normalized.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}
