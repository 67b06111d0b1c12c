//! # pixie-index
//!
//! Semantic image search over a directory tree: a background indexing
//! pipeline that embeds images into a SQLite-backed vector collection, and a
//! query path that embeds text and ranks images by cosine similarity.
//!
//! ## Architecture
//!
//! - [`storage`]: the [`VectorStore`](storage::VectorStore) trait and its
//!   SQLite implementation
//! - [`indexing`]: progress tracking and the run coordinator
//! - [`search`]: text-to-image query engine
//! - [`service`]: the [`ImageSearchService`](service::ImageSearchService)
//!   facade adapters talk to
//! - [`config`]: service configuration
//!
//! Embedding itself lives in the `pixie-embed` crate; everything here works
//! against its `EmbeddingProvider` trait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pixie_index::config::ServiceConfig;
//! use pixie_index::service::ImageSearchService;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = ImageSearchService::create(ServiceConfig::new("/photos")).await?;
//! service.run_indexing(None).await?;
//!
//! let response = service.search("a dog on a beach", None, 0.2).await?;
//! for result in &response.results {
//!     println!("{:.3}  {}", result.score, result.relative_path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod indexing;
pub mod search;
pub mod service;
pub mod storage;

pub use config::ServiceConfig;
pub use indexing::{IndexingStatus, RunOutcome, StatusTracker};
pub use search::{SearchEngine, SearchError, SearchResponse, SearchResult};
pub use service::{ImageSearchService, ServeError, ServiceStats, StartOutcome};
pub use storage::{ImagePayload, ImageRecord, StoreError, VectorStore};
