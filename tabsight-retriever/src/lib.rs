//! tabsight-retriever: dataset-scoped vector indexing and retrieval
//!
//! Stores short analysis texts (insights, story paragraphs) tagged with their
//! dataset and retrieves the most relevant ones as grounding context.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: the [`storage::VectorIndex`] trait with SQLite and
//!   in-memory backends
//! - **[`retrieval`]**: the [`retrieval::RetrievalGateway`] combining an
//!   embedder with an index
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tabsight_embed::HashEmbedProvider;
//! use tabsight_retriever::retrieval::{GatewayConfig, RetrievalGateway};
//! use tabsight_retriever::retrieval::gateway::source_metadata;
//! use tabsight_retriever::storage::{IndexBackend, open_index};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let index = open_index(&IndexBackend::SqliteMemory).await;
//! let gateway = RetrievalGateway::new(
//!     Arc::new(HashEmbedProvider::default()),
//!     index,
//!     GatewayConfig::default(),
//! );
//! gateway
//!     .index_text("titanic", &["Fare is right-skewed".to_string()], &[source_metadata("insight")])
//!     .await?;
//! let context = gateway.search("titanic", "how are fares distributed?", None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! texts → EmbeddingProvider → Points{dataset_id, text, metadata} → VectorIndex
//! query → EmbeddingProvider → filtered search(dataset_id) → texts
//! ```

pub mod retrieval;
pub mod storage;
