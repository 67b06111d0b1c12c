//! # pixie-embed
//!
//! Embedding providers for cross-modal image search, built on local ONNX
//! models via FastEmbed. Text and image inputs are mapped into one shared
//! unit-norm vector space so a text query can be compared directly against
//! indexed images.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pixie_embed::{ClipEmbedProvider, EmbedConfig, EmbeddingProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = ClipEmbedProvider::create(
//!     EmbedConfig::clip_vit_b32("/tmp/models")
//! ).await?;
//!
//! let query = provider.embed_text("a photo of a dog on a beach").await?;
//! println!("query vector of dimension {}", query.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: model configuration
//! - [`provider`]: the [`EmbeddingProvider`] trait and the CLIP implementation
//! - [`noop`]: deterministic stand-in provider for tests and development
//! - [`error`]: error types and result handling
//!
//! Models are cached process-wide so multiple providers with the same
//! configuration share one loaded model pair. Inference runs under
//! `spawn_blocking` to keep async executors unblocked.

pub mod config;
pub mod error;
pub mod noop;
pub mod provider;

// Re-export main types for easy access
pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use noop::NoopEmbedProvider;
pub use provider::{ClipEmbedProvider, EmbeddingProvider};
