//! SQLite-backed vector store.
//!
//! Vectors are stored as f32 BLOBs (via bytemuck) in a `records` table keyed
//! by (collection, id); similarity ranking is a brute-force cosine pass in
//! Rust, which is plenty for the collection sizes this index targets.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE collections (
//!     name TEXT PRIMARY KEY,
//!     dimension INTEGER NOT NULL,
//!     metric TEXT NOT NULL,
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! CREATE TABLE records (
//!     collection TEXT NOT NULL,
//!     id TEXT NOT NULL,                -- blake3(absolute path), hex
//!     vector BLOB NOT NULL,            -- f32 little-endian
//!     filename TEXT NOT NULL,
//!     path TEXT NOT NULL,
//!     relative_path TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     indexed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
//!     PRIMARY KEY (collection, id)
//! );
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use super::{ImagePayload, ImageRecord, Metric, ScoredPoint, StoreError, VectorStore};

/// SQLite implementation of [`VectorStore`].
#[derive(Clone, Debug)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (or create) a store at the given database path.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// Open an in-memory store, primarily for testing.
    pub async fn open_memory() -> Result<Self, StoreError> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                vector BLOB NOT NULL,
                filename TEXT NOT NULL,
                path TEXT NOT NULL,
                relative_path TEXT NOT NULL,
                description TEXT NOT NULL,
                indexed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (collection, id),
                FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Look up a collection's dimension, if it exists.
    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>, StoreError> {
        let dimension: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(dimension.map(|d| d as usize))
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: Metric,
    ) -> Result<(), StoreError> {
        let existing = sqlx::query("SELECT dimension, metric FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            let existing_dimension = row.get::<i64, _>("dimension") as usize;
            let existing_metric: String = row.get("metric");
            if existing_dimension != dimension || existing_metric != metric.as_str() {
                return Err(StoreError::CollectionMismatch {
                    name: name.to_string(),
                    existing_dimension,
                    existing_metric,
                    requested_dimension: dimension,
                    requested_metric: metric.as_str().to_string(),
                });
            }
            tracing::debug!("Using existing collection: '{}'", name);
            return Ok(());
        }

        sqlx::query("INSERT INTO collections (name, dimension, metric) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(dimension as i64)
            .bind(metric.as_str())
            .execute(&self.pool)
            .await?;
        tracing::info!("Created new collection: '{}' (dim {})", name, dimension);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[ImageRecord]) -> Result<(), StoreError> {
        let dimension = self
            .collection_dimension(collection)
            .await?
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: collection.to_string(),
            })?;

        let mut tx = self.pool.begin().await?;

        for record in records {
            if record.vector.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    got: record.vector.len(),
                });
            }
            let vector_bytes = bytemuck::cast_slice::<f32, u8>(&record.vector);

            sqlx::query(
                r#"
                INSERT INTO records (collection, id, vector, filename, path, relative_path, description, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
                ON CONFLICT(collection, id) DO UPDATE SET
                    vector = excluded.vector,
                    filename = excluded.filename,
                    path = excluded.path,
                    relative_path = excluded.relative_path,
                    description = excluded.description,
                    indexed_at = datetime('now')
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(vector_bytes)
            .bind(&record.payload.filename)
            .bind(&record.payload.path)
            .bind(&record.payload.relative_path)
            .bind(&record.payload.description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        if self.collection_dimension(collection).await?.is_none() {
            return Err(StoreError::CollectionNotFound {
                name: collection.to_string(),
            });
        }

        let rows = sqlx::query(
            "SELECT id, vector, filename, path, relative_path, description
             FROM records WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredPoint> = Vec::with_capacity(rows.len());
        for row in rows {
            let vector_bytes: Vec<u8> = row.get("vector");
            // pod_collect_to_vec copies, sidestepping blob alignment
            let vector: Vec<f32> = bytemuck::pod_collect_to_vec(&vector_bytes);
            let score = cosine_similarity(query, &vector);

            scored.push(ScoredPoint {
                id: row.get("id"),
                score,
                payload: ImagePayload {
                    filename: row.get("filename"),
                    path: row.get("path"),
                    relative_path: row.get("relative_path"),
                    description: row.get("description"),
                },
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn stats(&self, collection: &str) -> Result<usize, StoreError> {
        // Absent collections report 0 rather than an error so status
        // reporting stays resilient.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

/// Cosine similarity between two f32 vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
