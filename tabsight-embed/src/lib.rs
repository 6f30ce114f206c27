//! # tabsight-embed
//!
//! Text embeddings for dataset insight retrieval. Two providers sit behind the
//! [`EmbeddingProvider`] trait:
//!
//! - [`FastEmbedProvider`]: local ONNX sentence-transformer models via
//!   fastembed (`all-MiniLM-L6-v2`, 384 dimensions, by default). Compiled with
//!   the default `fastembed` feature.
//! - [`HashEmbedProvider`]: a deterministic stand-in that needs no model files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabsight_embed::{EmbedBackend, EmbedConfig, load_provider};
//!
//! # async fn example() -> tabsight_embed::Result<()> {
//! let provider = load_provider(&EmbedConfig::default(), EmbedBackend::FastEmbed).await;
//! let vector = provider.embed_text("Fare is skewed to the right").await?;
//! assert_eq!(vector.len(), provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```
//!
//! [`load_provider`] never fails: when the model cannot be loaded it logs a
//! warning and hands back the stand-in with the configured dimension.
//!
//! ## Memory Usage
//!
//! Vectors are returned as half-precision (f16). Models are cached globally so
//! providers built from the same configuration share one loaded model.

pub mod config;
pub mod error;
#[cfg(feature = "fastembed")]
pub mod fastembed_provider;
pub mod hash_provider;
pub mod provider;

use std::sync::Arc;

pub use config::{
    DEFAULT_DIMENSION, DEFAULT_MODEL_NAME, EmbedBackend, EmbedConfig, EmbedConfigBuilder,
};
pub use error::{EmbedError, Result};
#[cfg(feature = "fastembed")]
pub use fastembed_provider::FastEmbedProvider;
pub use hash_provider::HashEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult};

/// Build the provider selected by `backend`.
///
/// A real model that fails to load is replaced by [`HashEmbedProvider`] of
/// the configured dimension, so startup never aborts on missing model files.
pub async fn load_provider(
    config: &EmbedConfig,
    backend: EmbedBackend,
) -> Arc<dyn EmbeddingProvider> {
    match backend {
        EmbedBackend::Hash => {
            tracing::info!("Using hash embedding provider ({} dims)", config.dimension);
            Arc::new(HashEmbedProvider::new(config.dimension))
        }
        EmbedBackend::FastEmbed => match load_fastembed(config).await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!(
                    "Could not load embedding model '{}': {}; falling back to hash embeddings",
                    config.model_name(),
                    e
                );
                Arc::new(HashEmbedProvider::new(config.dimension))
            }
        },
    }
}

#[cfg(feature = "fastembed")]
async fn load_fastembed(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = FastEmbedProvider::create(config.clone()).await?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "fastembed"))]
async fn load_fastembed(_config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(EmbedError::BackendUnavailable {
        backend: EmbedBackend::FastEmbed.to_string(),
    })
}
