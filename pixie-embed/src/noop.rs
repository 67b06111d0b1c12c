//! Deterministic stand-in embedder for tests and development.
//!
//! [`NoopEmbedProvider`] derives unit vectors from an fnv hash of the input,
//! so the same text or file name always maps to the same vector without any
//! ONNX runtime. It mimics the real provider's batch failure contract: an
//! image file that cannot be read, or is empty, fails the whole batch.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, l2_normalize};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;
use std::path::PathBuf;

/// Deterministic hash-based embedding provider.
pub struct NoopEmbedProvider {
    dimension: usize,
}

impl NoopEmbedProvider {
    /// Create a provider with the default CLIP-compatible dimension (512).
    pub fn new() -> Self {
        Self { dimension: 512 }
    }

    /// Create a provider with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_vector(&self, input: &[u8]) -> Vec<f32> {
        let mut hasher = FnvHasher::default();
        hasher.write(input);
        let mut state = hasher.finish();

        // splitmix64 expansion of the seed into a full vector
        let mut vec = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state = state.wrapping_add(0x9e3779b97f4a7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            z ^= z >> 31;
            vec.push((z as f64 / u64::MAX as f64) as f32 - 0.5);
        }
        l2_normalize(&mut vec);
        vec
    }
}

impl Default for NoopEmbedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for NoopEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_vector(text.as_bytes()))
    }

    async fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(path).await?;
            if bytes.is_empty() {
                // Stands in for an undecodable image; fails the whole batch
                return Err(EmbedError::embedding_gen(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("cannot decode image: {}", path.display()),
                )));
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            embeddings.push(self.hash_vector(name.as_bytes()));
        }
        Ok(embeddings)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "noop"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_defaults() {
        let provider = NoopEmbedProvider::new();
        assert_eq!(provider.embedding_dimension(), 512);
        assert_eq!(provider.provider_name(), "noop");
        assert!(provider.is_ready());

        let provider = NoopEmbedProvider::with_dimension(8);
        assert_eq!(provider.embedding_dimension(), 8);
    }

    #[tokio::test]
    async fn test_text_embeddings_deterministic_and_normalized() {
        let provider = NoopEmbedProvider::with_dimension(16);

        let a = provider.embed_text("sunset over water").await.unwrap();
        let b = provider.embed_text("sunset over water").await.unwrap();
        let c = provider.embed_text("a red bicycle").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_image_batch_fails_on_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let good = temp_dir.path().join("good.jpg");
        let corrupt = temp_dir.path().join("corrupt.jpg");
        tokio::fs::write(&good, b"not really a jpeg but nonempty")
            .await
            .unwrap();
        tokio::fs::write(&corrupt, b"").await.unwrap();

        let provider = NoopEmbedProvider::with_dimension(8);

        let ok = provider.embed_images(&[good.clone()]).await.unwrap();
        assert_eq!(ok.len(), 1);

        let err = provider.embed_images(&[good, corrupt]).await.unwrap_err();
        assert!(matches!(err, EmbedError::EmbeddingGeneration { .. }));
    }

    #[tokio::test]
    async fn test_image_embedding_depends_on_filename_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir_a = temp_dir.path().join("a");
        let dir_b = temp_dir.path().join("b");
        tokio::fs::create_dir_all(&dir_a).await.unwrap();
        tokio::fs::create_dir_all(&dir_b).await.unwrap();

        let first = dir_a.join("cat.jpg");
        let second = dir_b.join("cat.jpg");
        tokio::fs::write(&first, b"x").await.unwrap();
        tokio::fs::write(&second, b"y").await.unwrap();

        let provider = NoopEmbedProvider::with_dimension(8);
        let embeddings = provider.embed_images(&[first, second]).await.unwrap();
        assert_eq!(embeddings[0], embeddings[1]);
    }
}
