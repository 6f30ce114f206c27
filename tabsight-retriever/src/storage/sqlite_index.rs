//! SQLite implementation of [`VectorIndex`].
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE collections (
//!     name TEXT PRIMARY KEY,
//!     dimension INTEGER NOT NULL,
//!     distance TEXT NOT NULL,
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! CREATE TABLE points (
//!     seq INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order, tie-breaker
//!     collection TEXT NOT NULL REFERENCES collections(name),
//!     id TEXT NOT NULL,                       -- UUID v4
//!     dataset_id TEXT NOT NULL,
//!     text TEXT NOT NULL,
//!     metadata TEXT NOT NULL,                 -- JSON object
//!     vector BLOB NOT NULL,                   -- f16 little-endian
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
//!     UNIQUE(collection, id)
//! );
//! ```
//!
//! Similarity is computed in process over the rows of the filtered dataset.

use super::{CollectionConfig, DatasetFilter, Metadata, Payload, Point, ScoredPoint, VectorIndex};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// SQLite-backed vector index
#[derive(Clone, Debug)]
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Opens (creating if needed) a persistent index at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true)
                .page_size(1 << 16),
        )
        .await
        .with_context(|| format!("opening index database {}", path.display()))?;
        Self::new_with_pool(pool).await
    }

    /// Opens an in-memory index for tests and ephemeral runs.
    pub async fn open_memory() -> Result<Self> {
        // every pooled connection to :memory: would get its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                distance TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS points (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                vector BLOB NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT unique_point UNIQUE(collection, id),
                FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_points_dataset ON points(collection, dataset_id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn collection_dimension(&self, collection: &str) -> Result<Option<usize>> {
        let row = sqlx::query("SELECT dimension FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("dimension") as usize))
    }

    pub async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collection_dimension(collection).await?.is_some())
    }

    async fn require_dimension(&self, collection: &str) -> Result<usize> {
        self.collection_dimension(collection)
            .await?
            .ok_or_else(|| anyhow!("collection '{collection}' does not exist"))
    }
}

fn encode_vector(vector: &[f16]) -> &[u8] {
    bytemuck::cast_slice(vector)
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f16>> {
    if bytes.len() % 2 != 0 {
        bail!("corrupt vector blob of {} bytes", bytes.len());
    }
    // blobs are not guaranteed to be 2-byte aligned
    Ok(bytemuck::pod_collect_to_vec::<u8, f16>(bytes))
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or zero norms.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.to_f32(), y.to_f32());
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn ensure_collection(&self, config: &CollectionConfig) -> Result<()> {
        match self.collection_dimension(&config.name).await? {
            Some(existing) if existing != config.dimension => bail!(
                "collection '{}' exists with dimension {}, requested {}",
                config.name,
                existing,
                config.dimension
            ),
            Some(_) => Ok(()),
            None => {
                sqlx::query(
                    "INSERT OR IGNORE INTO collections (name, dimension, distance) VALUES (?, ?, ?)",
                )
                .bind(&config.name)
                .bind(config.dimension as i64)
                .bind(config.distance.as_str())
                .execute(&self.pool)
                .await?;
                tracing::info!(
                    "Created collection '{}' ({} dims, {})",
                    config.name,
                    config.dimension,
                    config.distance.as_str()
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let dimension = self.require_dimension(collection).await?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != dimension) {
            bail!(
                "point {} has {} dimensions, collection '{}' expects {}",
                bad.id,
                bad.vector.len(),
                collection,
                dimension
            );
        }

        let mut tx = self.pool.begin().await?;
        for point in &points {
            let metadata = serde_json::to_string(&point.payload.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO points (collection, id, dataset_id, text, metadata, vector)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    dataset_id = excluded.dataset_id,
                    text = excluded.text,
                    metadata = excluded.metadata,
                    vector = excluded.vector
                "#,
            )
            .bind(collection)
            .bind(&point.id)
            .bind(&point.payload.dataset_id)
            .bind(&point.payload.text)
            .bind(metadata)
            .bind(encode_vector(&point.vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!("Upserted {} points into '{}'", points.len(), collection);
        Ok(points.len())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f16],
        filter: &DatasetFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let dimension = self.require_dimension(collection).await?;
        if vector.len() != dimension {
            bail!(
                "query has {} dimensions, collection '{}' expects {}",
                vector.len(),
                collection,
                dimension
            );
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, dataset_id, text, metadata, vector
            FROM points
            WHERE collection = ?1 AND (?2 IS NULL OR dataset_id = ?2)
            ORDER BY seq
            "#,
        )
        .bind(collection)
        .bind(filter.dataset_id.as_deref())
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let stored = decode_vector(row.get::<&[u8], _>("vector"))?;
            let metadata: Metadata = serde_json::from_str(row.get::<&str, _>("metadata"))?;
            let score = cosine_similarity(vector, &stored);
            scored.push(ScoredPoint {
                point: Point {
                    id: row.get("id"),
                    vector: stored,
                    payload: Payload {
                        dataset_id: row.get("dataset_id"),
                        text: row.get("text"),
                        metadata,
                    },
                },
                score: Some(score),
            });
        }

        // stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| {
            let (a, b) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
            b.total_cmp(&a)
        });
        scored.truncate(limit);

        tracing::debug!(
            "Search in '{}' returned {} points",
            collection,
            scored.len()
        );
        Ok(scored)
    }

    async fn count(&self, collection: &str, filter: &DatasetFilter) -> Result<usize> {
        self.require_dimension(collection).await?;
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM points WHERE collection = ?1 AND (?2 IS NULL OR dataset_id = ?2)",
        )
        .bind(collection)
        .bind(filter.dataset_id.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("n") as usize)
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
