//! Storage abstraction layer for dataset vector indexes
//!
//! All datasets share one logical collection; isolation comes from filtering
//! on the `dataset_id` carried in every point's payload.
//!
//! ## Key Components
//!
//! - **VectorIndex**: collection management, upsert, filtered search
//! - **SqliteIndex**: persistent backend ranking by cosine similarity
//! - **InMemoryIndex**: stand-in backend returning the newest points first
//! - **IndexBackend** / [`open_index`]: configuration-driven backend selection
//!
//! ## Architecture
//!
//! ```text
//!                ┌─ SqliteIndex (cosine, f16 blobs)
//! VectorIndex ───┤
//!                └─ InMemoryIndex (recency, no scores)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use half::f16;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub mod memory_index;
pub mod sqlite_index;

pub use memory_index::InMemoryIndex;
pub use sqlite_index::SqliteIndex;

/// Caller-supplied payload fields, e.g. `{"source": "insight"}`.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Point identifier; a fresh UUID v4 string per indexed text.
pub type PointId = String;

/// Generate a new random point id.
pub fn new_point_id() -> PointId {
    uuid::Uuid::new_v4().to_string()
}

/// What a point carries besides its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub dataset_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A stored vector with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f16>,
    pub payload: Payload,
}

impl Point {
    /// Build a point with a fresh id.
    pub fn new(vector: Vec<f16>, payload: Payload) -> Self {
        Self {
            id: new_point_id(),
            vector,
            payload,
        }
    }
}

/// Search hit. `score` is `None` for backends that do not compute similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub point: Point,
    pub score: Option<f32>,
}

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "cosine",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            distance: Distance::Cosine,
        }
    }
}

/// Restricts searches and counts to one dataset, or to none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFilter {
    pub dataset_id: Option<String>,
}

impl DatasetFilter {
    pub fn dataset(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
        }
    }

    /// Match every point in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        self.dataset_id
            .as_deref()
            .is_none_or(|id| id == payload.dataset_id)
    }
}

/// Vector store operations shared by every backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if absent. Errors if it exists with another dimension.
    async fn ensure_collection(&self, config: &CollectionConfig) -> Result<()>;

    /// Insert points, replacing any existing point with the same id
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<usize>;

    /// Up to `limit` points matching `filter`, most relevant first
    async fn search(
        &self,
        collection: &str,
        vector: &[f16],
        filter: &DatasetFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    /// Number of points matching `filter`
    async fn count(&self, collection: &str, filter: &DatasetFilter) -> Result<usize>;

    /// Short identifier for logs
    fn backend_name(&self) -> &str;
}

/// Which index backend to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexBackend {
    /// File-backed SQLite database
    Sqlite { path: PathBuf },
    /// SQLite held in memory for the life of the process
    SqliteMemory,
    /// Recency-ordered stand-in
    InMemory,
}

impl IndexBackend {
    pub fn name(&self) -> &'static str {
        match self {
            IndexBackend::Sqlite { .. } => "sqlite",
            IndexBackend::SqliteMemory => "sqlite-memory",
            IndexBackend::InMemory => "in-memory",
        }
    }
}

impl Default for IndexBackend {
    fn default() -> Self {
        IndexBackend::Sqlite {
            path: PathBuf::from("tabsight-index.db"),
        }
    }
}

/// Open the configured backend. A SQLite backend that cannot be opened is
/// replaced by [`InMemoryIndex`] with a warning.
pub async fn open_index(backend: &IndexBackend) -> Arc<dyn VectorIndex> {
    let opened = match backend {
        IndexBackend::InMemory => return Arc::new(InMemoryIndex::new()),
        IndexBackend::Sqlite { path } => SqliteIndex::open(path).await,
        IndexBackend::SqliteMemory => SqliteIndex::open_memory().await,
    };

    match opened {
        Ok(index) => {
            tracing::info!("Opened {} vector index", backend.name());
            Arc::new(index)
        }
        Err(e) => {
            tracing::warn!(
                "Could not open {} vector index: {:#}; falling back to in-memory index",
                backend.name(),
                e
            );
            Arc::new(InMemoryIndex::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(dataset: &str) -> Payload {
        Payload {
            dataset_id: dataset.to_string(),
            text: "t".to_string(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_filter_matching() {
        assert!(DatasetFilter::dataset("a").matches(&payload("a")));
        assert!(!DatasetFilter::dataset("a").matches(&payload("b")));
        assert!(DatasetFilter::all().matches(&payload("b")));
    }

    #[test]
    fn test_point_ids_are_fresh() {
        let a = Point::new(vec![], payload("a"));
        let b = Point::new(vec![], payload("a"));
        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_backend_config_round_trip() {
        let backend: IndexBackend =
            serde_json::from_str(r#"{"type": "sqlite", "path": "/var/lib/tabsight/index.db"}"#)
                .unwrap();
        assert_eq!(
            backend,
            IndexBackend::Sqlite {
                path: PathBuf::from("/var/lib/tabsight/index.db")
            }
        );
        let memory: IndexBackend = serde_json::from_str(r#"{"type": "in_memory"}"#).unwrap();
        assert_eq!(memory, IndexBackend::InMemory);
    }

    #[tokio::test]
    async fn test_unopenable_sqlite_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as a database file
        let backend = IndexBackend::Sqlite {
            path: dir.path().to_path_buf(),
        };
        let index = open_index(&backend).await;
        assert_eq!(index.backend_name(), "in-memory");
    }
}
