//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use fnv::FnvHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

/// Trait for embedding providers that map text or images into one shared
/// vector space.
///
/// Both methods return unit-norm vectors of [`embedding_dimension`] length
/// regardless of input modality; that shared space is what makes text-to-image
/// search meaningful. `embed_images` is batch-oriented for throughput and
/// fails as a whole if any image in the batch cannot be decoded: callers must
/// treat every path in a failed batch as failed.
///
/// [`embedding_dimension`]: EmbeddingProvider::embedding_dimension
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text query
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of image files
    async fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Compute device the models run on
    fn device(&self) -> &str {
        "cpu"
    }

    /// Whether the underlying models are loaded and usable
    fn is_ready(&self) -> bool;
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub(crate) fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}

/// Type alias for cached model entries (text model, image model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, Arc<Mutex<ImageEmbedding>>, usize);

/// Global cache for initialized model pairs to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn get_model_cache() -> &'static Mutex<HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// CLIP embedding provider backed by fastembed ONNX models.
///
/// Loads the ViT-B/32 text and vision models as a pair so both modalities
/// land in the same 512-dimensional space. Model loading and inference run
/// under `spawn_blocking`; the provider itself is cheap to clone and safe to
/// share across tasks.
#[derive(Clone)]
pub struct ClipEmbedProvider {
    config: EmbedConfig,
    text_model: Option<Arc<Mutex<TextEmbedding>>>,
    image_model: Option<Arc<Mutex<ImageEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for ClipEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipEmbedProvider")
            .field("config", &self.config)
            .field("text_model", &self.text_model.is_some())
            .field("image_model", &self.image_model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl ClipEmbedProvider {
    /// Creates a new uninitialized provider. Call [`initialize`](Self::initialize)
    /// or use [`create`](Self::create) before embedding anything.
    pub fn new(config: EmbedConfig) -> Self {
        Self {
            config,
            text_model: None,
            image_model: None,
            dimension: 512, // CLIP ViT-B/32 output dimension
        }
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// Downloads (if needed) and loads the text and vision models, with
    /// process-wide caching so repeated providers share one loaded pair.
    pub async fn initialize(&mut self) -> Result<()> {
        tracing::info!(
            "Initializing CLIP provider for model: {}",
            self.config.model_name
        );

        let cache_key = self.create_cache_key();

        // Check if the model pair is already cached
        let cached = {
            let cache = get_model_cache().lock().unwrap();
            cache
                .get(&cache_key)
                .map(|(text, image, dim)| (Arc::clone(text), Arc::clone(image), *dim))
        };

        if let Some((text_model, image_model, dimension)) = cached {
            tracing::info!("Using cached model pair for: {}", self.config.model_name);
            self.text_model = Some(text_model);
            self.image_model = Some(image_model);
            self.dimension = dimension;
            return Ok(());
        }

        // Load both models in a blocking task
        let config = self.config.clone();
        let (text_model, image_model, dimension) = tokio::task::spawn_blocking(
            move || -> Result<(TextEmbedding, ImageEmbedding, usize)> {
                tracing::info!("Loading embedding model pair: {}", config.model_name);

                let text_options = InitOptions::new(EmbeddingModel::ClipVitB32)
                    .with_cache_dir(config.cache_dir.clone())
                    .with_show_download_progress(true);
                let mut text_model = TextEmbedding::try_new(text_options)
                    .map_err(|e| EmbedError::External { source: e })?;

                let image_options = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                    .with_cache_dir(config.cache_dir.clone())
                    .with_show_download_progress(true);
                let image_model = ImageEmbedding::try_new(image_options)
                    .map_err(|e| EmbedError::External { source: e })?;

                // Probe the dimension with a test embedding
                let probe = text_model
                    .embed(vec!["test".to_string()], None)
                    .map_err(|e| EmbedError::External { source: e })?;
                let dimension = probe.first().map(|emb| emb.len()).unwrap_or(512);

                tracing::info!("Model pair loaded successfully. Dimension: {}", dimension);
                Ok((text_model, image_model, dimension))
            },
        )
        .await??;

        let text_arc = Arc::new(Mutex::new(text_model));
        let image_arc = Arc::new(Mutex::new(image_model));

        {
            let mut cache = get_model_cache().lock().unwrap();
            cache.insert(
                cache_key,
                (Arc::clone(&text_arc), Arc::clone(&image_arc), dimension),
            );
        }

        self.text_model = Some(text_arc);
        self.image_model = Some(image_arc);
        self.dimension = dimension;
        Ok(())
    }

    /// Create a cache key based on the model configuration
    fn create_cache_key(&self) -> String {
        let config_json =
            serde_json::to_string(&self.config).expect("Config should always serialize");

        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(config_json.as_bytes());

        format!("v1:{:x}", hasher.finish())
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        let cache = get_model_cache();
        let mut cache_guard = cache.lock().unwrap();
        cache_guard.clear();
        tracing::info!("Model cache cleared");
    }

    /// Returns the number of cached model pairs.
    pub fn cache_size() -> usize {
        let cache = get_model_cache();
        let cache_guard = cache.lock().unwrap();
        cache_guard.len()
    }

    fn maybe_normalize(&self, mut embeddings: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        if self.config.normalize {
            for embedding in &mut embeddings {
                l2_normalize(embedding);
            }
        }
        embeddings
    }
}

#[async_trait]
impl EmbeddingProvider for ClipEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.text_model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        let text = text.to_string();
        let model_clone = Arc::clone(model);
        let batch_size = self.config.batch_size;

        let embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model_guard = model_clone.lock().unwrap();
            model_guard
                .embed(vec![text], Some(batch_size))
                .map_err(|e| EmbedError::External { source: e })
        })
        .await??;

        self.maybe_normalize(embeddings)
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    async fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        if paths.is_empty() {
            return Ok(vec![]);
        }

        let model = self.image_model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} images", paths.len());

        let paths = paths.to_vec();
        let model_clone = Arc::clone(model);
        let batch_size = self.config.batch_size;

        // A single undecodable image fails the whole call, so a batch is all
        // or nothing by construction.
        let embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model_guard = model_clone.lock().unwrap();
            model_guard
                .embed(paths, Some(batch_size))
                .map_err(|e| EmbedError::External { source: e })
        })
        .await??;

        Ok(self.maybe_normalize(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed-clip"
    }

    fn is_ready(&self) -> bool {
        self.text_model.is_some() && self.image_model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_provider_creation() {
        let config = EmbedConfig::default_with_path("/tmp/models");
        let provider = ClipEmbedProvider::new(config);

        assert_eq!(provider.provider_name(), "fastembed-clip");
        assert_eq!(provider.embedding_dimension(), 512);
        assert_eq!(provider.device(), "cpu");
        assert!(!provider.is_ready());
    }

    #[test]
    fn test_l2_normalize() {
        let mut vec = vec![3.0, 4.0];
        l2_normalize(&mut vec);
        assert!((vec[0] - 0.6).abs() < 1e-6);
        assert!((vec[1] - 0.8).abs() < 1e-6);

        // Zero vectors stay zero rather than dividing by zero
        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cache_key_generation() {
        let config = EmbedConfig::default_with_path("/tmp/models");
        let provider1 = ClipEmbedProvider::new(config.clone());
        let provider2 = ClipEmbedProvider::new(config);

        let key1 = provider1.create_cache_key();
        let key2 = provider2.create_cache_key();
        assert_eq!(key1, key2, "Same config should produce same cache key");
        assert!(key1.starts_with("v1:"));

        let other = ClipEmbedProvider::new(
            EmbedConfig::default_with_path("/tmp/models").with_batch_size(4),
        );
        assert_ne!(
            key1,
            other.create_cache_key(),
            "Different configs should produce different cache keys"
        );
    }

    #[tokio::test]
    async fn test_embed_before_initialize_fails() {
        let provider = ClipEmbedProvider::new(EmbedConfig::default_with_path("/tmp/models"));

        let err = provider.embed_text("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));

        let err = provider
            .embed_images(&[PathBuf::from("a.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_embed_images_empty_batch() {
        // An empty batch short-circuits before touching the model
        let provider = ClipEmbedProvider::new(EmbedConfig::default_with_path("/tmp/models"));
        let embeddings = provider.embed_images(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    #[ignore] // Integration test: downloads the real CLIP models - run with: cargo test test_clip_download_and_embedding -- --ignored
    async fn test_clip_download_and_embedding() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = EmbedConfig::clip_vit_b32(temp_dir.path());

        let provider = ClipEmbedProvider::create(config).await?;
        assert!(provider.is_ready());
        assert_eq!(provider.embedding_dimension(), 512);

        let embedding = provider.embed_text("a photo of a cat").await?;
        assert_eq!(embedding.len(), 512);
        assert!(embedding.iter().any(|&x| x != 0.0));
        assert!(embedding.iter().all(|&x| x.is_finite()));

        // Normalized output should have unit norm
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);

        Ok(())
    }
}
