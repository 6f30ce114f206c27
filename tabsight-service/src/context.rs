use crate::config::ServiceConfig;
use crate::llm::{LlmClient, build_llm_client};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tabsight_embed::{EmbeddingProvider, load_provider};
use tabsight_retriever::retrieval::{GatewayConfig, RetrievalGateway};
use tabsight_retriever::storage::{VectorIndex, open_index};

/// Long-lived collaborators, built once at startup and shared by handle.
#[derive(Clone)]
pub struct AppContext {
    pub config: ServiceConfig,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub gateway: RetrievalGateway,
    pub llm: Arc<dyn LlmClient>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("embedder", &self.embedder.provider_name())
            .field("index", &self.index.backend_name())
            .field("llm", &self.llm.name())
            .finish()
    }
}

impl AppContext {
    /// Embedder and index degrade to their stand-ins when the configured
    /// backend cannot be opened; only an unusable LLM client is an error.
    pub async fn initialize(config: &ServiceConfig) -> Result<Self> {
        let embedder = load_provider(&config.embedding.model, config.embedding.backend).await;
        let index = open_index(&config.index).await;
        let llm = build_llm_client(&config.llm)?;
        let context = Self::from_parts(config.clone(), embedder, index, llm);
        tracing::info!(
            "Initialized context: embedder={} index={} llm={}",
            context.embedder.provider_name(),
            context.index.backend_name(),
            context.llm.name()
        );
        Ok(context)
    }

    pub fn from_parts(
        config: ServiceConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let gateway_config = GatewayConfig::default()
            .with_collection(config.retrieval.collection.clone())
            .with_dimension(embedder.embedding_dimension())
            .with_default_limit(config.retrieval.limit)
            .with_timeout(Duration::from_secs(config.retrieval.timeout_secs));
        let gateway = RetrievalGateway::new(embedder.clone(), index.clone(), gateway_config);
        Self {
            config,
            embedder,
            index,
            gateway,
            llm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsight_embed::EmbedBackend;
    use tabsight_retriever::storage::IndexBackend;

    #[tokio::test]
    async fn test_initialize_with_stand_ins() {
        let mut config = ServiceConfig::default();
        config.embedding.backend = EmbedBackend::Hash;
        config.embedding.model.dimension = 64;
        config.index = IndexBackend::InMemory;
        config.retrieval.limit = 5;

        let context = AppContext::initialize(&config).await.unwrap();
        assert_eq!(context.embedder.provider_name(), "hash");
        assert_eq!(context.embedder.embedding_dimension(), 64);
        assert_eq!(context.gateway.config().dimension, 64);
        assert_eq!(context.gateway.config().default_limit, 5);
        assert_eq!(context.llm.name(), "mock");
    }
}
