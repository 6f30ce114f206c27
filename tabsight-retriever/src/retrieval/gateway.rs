//! Dataset-scoped indexing and retrieval of text over an embedder and a
//! vector index.
//!
//! The strict operations return [`GatewayError`]; flows that must keep going
//! when retrieval is unavailable use [`RetrievalGateway::index_text_best_effort`]
//! and [`RetrievalGateway::search_or_empty`].

use crate::storage::{CollectionConfig, DatasetFilter, Metadata, Payload, Point, VectorIndex};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tabsight_embed::{DEFAULT_DIMENSION, EmbedError, EmbeddingProvider};

pub const DEFAULT_COLLECTION: &str = "insights";
pub const DEFAULT_SEARCH_LIMIT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Got {metadatas} metadata entries for {texts} texts")]
    MetadataMismatch { texts: usize, metadatas: usize },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Embedder returned {got} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("Vector index error: {0:#}")]
    Index(#[from] anyhow::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub collection: String,
    pub dimension: usize,
    pub default_limit: usize,
    /// Applied separately to each embedding and index call
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn with_collection(self, collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..self
        }
    }

    pub fn with_dimension(self, dimension: usize) -> Self {
        Self { dimension, ..self }
    }

    pub fn with_default_limit(self, default_limit: usize) -> Self {
        Self {
            default_limit,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    fn collection_config(&self) -> CollectionConfig {
        CollectionConfig::new(self.collection.clone(), self.dimension)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            dimension: DEFAULT_DIMENSION,
            default_limit: DEFAULT_SEARCH_LIMIT,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Shared handle; cloning is cheap.
#[derive(Clone)]
pub struct RetrievalGateway {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: GatewayConfig,
}

impl std::fmt::Debug for RetrievalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalGateway")
            .field("embedder", &self.embedder.provider_name())
            .field("index", &self.index.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl RetrievalGateway {
    /// The collection dimension always follows the embedder.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        mut config: GatewayConfig,
    ) -> Self {
        let dimension = embedder.embedding_dimension();
        if config.dimension != dimension {
            tracing::warn!(
                "Gateway configured for {} dims but embedder '{}' produces {}; using {}",
                config.dimension,
                embedder.provider_name(),
                dimension,
                dimension
            );
            config.dimension = dimension;
        }
        Self {
            embedder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    async fn timed<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<GatewayError>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(GatewayError::Timeout {
                operation,
                after: self.config.timeout,
            }),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        let config = self.config.collection_config();
        self.timed("ensure collection", self.index.ensure_collection(&config))
            .await
    }

    /// Embed `texts` in one batch and store one point per text for `dataset_id`.
    ///
    /// `metadatas` must be parallel to `texts`. Returns the number of points
    /// written; empty input writes nothing and touches no backend.
    pub async fn index_text(
        &self,
        dataset_id: &str,
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<usize> {
        if texts.is_empty() {
            return Ok(0);
        }
        if texts.len() != metadatas.len() {
            return Err(GatewayError::MetadataMismatch {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }

        self.ensure_collection().await?;
        let embedded = self.timed("embedding", self.embedder.embed_texts(texts)).await?;
        if embedded.len() != texts.len() {
            return Err(GatewayError::EmbeddingCount {
                expected: texts.len(),
                got: embedded.len(),
            });
        }

        let points: Vec<Point> = embedded
            .embeddings
            .into_iter()
            .zip(texts.iter().zip(metadatas))
            .map(|(vector, (text, metadata))| {
                Point::new(
                    vector,
                    Payload {
                        dataset_id: dataset_id.to_string(),
                        text: text.clone(),
                        metadata: metadata.clone(),
                    },
                )
            })
            .collect();

        let written = self
            .timed("upsert", self.index.upsert(&self.config.collection, points))
            .await?;
        tracing::info!("Indexed {} texts for dataset {}", written, dataset_id);
        Ok(written)
    }

    /// Texts indexed for `dataset_id`, most relevant first, at most `limit`
    /// (the configured default when `None`).
    pub async fn search(
        &self,
        dataset_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let limit = limit.unwrap_or(self.config.default_limit);
        self.ensure_collection().await?;

        let vector = self.timed("embedding", self.embedder.embed_text(query)).await?;
        let filter = DatasetFilter::dataset(dataset_id);
        let hits = self
            .timed(
                "search",
                self.index
                    .search(&self.config.collection, &vector, &filter, limit),
            )
            .await?;

        tracing::debug!(
            "Search for dataset {} returned {} of at most {}",
            dataset_id,
            hits.len(),
            limit
        );
        Ok(hits.into_iter().map(|hit| hit.point.payload.text).collect())
    }

    /// Number of points indexed for `dataset_id`.
    pub async fn count(&self, dataset_id: &str) -> Result<usize> {
        self.ensure_collection().await?;
        let filter = DatasetFilter::dataset(dataset_id);
        self.timed("count", self.index.count(&self.config.collection, &filter))
            .await
    }

    /// [`Self::index_text`], logging failures instead of returning them.
    pub async fn index_text_best_effort(
        &self,
        dataset_id: &str,
        texts: &[String],
        metadatas: &[Metadata],
    ) -> usize {
        match self.index_text(dataset_id, texts, metadatas).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!("Indexing for dataset {} failed: {}", dataset_id, e);
                0
            }
        }
    }

    /// [`Self::search`], treating any failure as "no context".
    pub async fn search_or_empty(
        &self,
        dataset_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Vec<String> {
        match self.search(dataset_id, query, limit).await {
            Ok(texts) => texts,
            Err(e) => {
                tracing::warn!("Search for dataset {} failed: {}", dataset_id, e);
                Vec::new()
            }
        }
    }
}

/// Metadata map holding a single `source` entry.
pub fn source_metadata(source: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), serde_json::Value::from(source));
    metadata
}
