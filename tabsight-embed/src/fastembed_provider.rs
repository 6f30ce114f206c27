//! FastEmbed-backed provider running local ONNX models.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, to_f16};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::OnceCell;

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Keyed slots that are each filled at most once.
///
/// The map lock is only held to find or create a slot; loading happens under
/// the slot's own async cell, so concurrent callers for one key wait for a
/// single load while other keys proceed. A failed load leaves the slot empty.
pub(crate) struct ModelSlots<T> {
    slots: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> ModelSlots<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<T>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &str) -> Arc<OnceCell<T>> {
        Arc::clone(self.lock().entry(key.to_string()).or_default())
    }

    /// Cached value for `key`, plus whether it was already there.
    pub(crate) async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<(T, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = self.slot(key);
        let mut loaded = false;
        let value = slot
            .get_or_try_init(|| {
                loaded = true;
                load()
            })
            .await?;
        Ok((value.clone(), !loaded))
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    /// Number of filled slots.
    pub(crate) fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }
}

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<ModelSlots<ModelCacheEntry>> = OnceLock::new();

fn model_cache() -> &'static ModelSlots<ModelCacheEntry> {
    MODEL_CACHE.get_or_init(ModelSlots::new)
}

/// Map a configured model name onto a fastembed built-in model.
pub fn builtin_model(name: &str) -> Result<EmbeddingModel> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            Ok(EmbeddingModel::AllMiniLML12V2)
        }
        "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "BAAI/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(EmbedError::invalid_config(format!(
            "unsupported fastembed model '{other}'"
        ))),
    }
}

/// FastEmbed-based embedding provider using real ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider; call [`Self::initialize`] before embedding.
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config.dimension;
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Load the model, reusing a process-wide cached instance when one exists
    /// for an identical configuration.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            self.config.model_name()
        );

        let cache_key = self.create_cache_key()?;
        let config = self.config.clone();
        let ((model, dimension), cached) = model_cache()
            .get_or_load(&cache_key, || load_model(config))
            .await?;
        if cached {
            tracing::info!("Using cached model for: {}", self.config.model_name());
        }

        self.model = Some(model);
        self.dimension = dimension;
        self.validate_model().await
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// Cache key derived from the full serialized configuration
    fn create_cache_key(&self) -> Result<String> {
        let config_json = serde_json::to_string(&self.config)
            .map_err(|e| EmbedError::invalid_config(format!("unserializable config: {e}")))?;

        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(config_json.as_bytes());

        Ok(format!("v1:{:x}", hasher.finish()))
    }

    /// Check the loaded model yields finite vectors of the expected width
    async fn validate_model(&self) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EmbedError::invalid_config("Model not initialized"))?;

        let model_clone = Arc::clone(model);
        let validation_result = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model_guard = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
            model_guard
                .embed(vec!["validation test".to_string()], None)
                .map_err(|e| EmbedError::External { source: e })
        })
        .await??;

        let embedding = validation_result.first().ok_or_else(|| {
            EmbedError::invalid_config("Model validation failed: no embeddings generated")
        })?;

        if embedding.len() != self.dimension {
            return Err(EmbedError::invalid_config(format!(
                "Model validation failed: expected dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name());
        Ok(())
    }

    /// Drop every cached model.
    pub fn clear_cache() {
        model_cache().clear();
        tracing::info!("Model cache cleared");
    }

    /// Number of cached models.
    pub fn cache_size() -> usize {
        model_cache().len()
    }
}

/// Load `config`'s model on the blocking pool and check its width.
async fn load_model(config: EmbedConfig) -> Result<ModelCacheEntry> {
    let model_kind = builtin_model(config.model_name())?;
    if let Some(dir) = &config.cache_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let expected = config.dimension;
    let name = config.model_name().to_string();
    let (model, dimension) =
        tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
            tracing::info!("Loading embedding model: {}", config.model_name());

            let mut init_options = InitOptions::new(model_kind)
                .with_show_download_progress(config.show_download_progress);
            if let Some(dir) = &config.cache_dir {
                init_options = init_options.with_cache_dir(dir.clone());
            }

            let mut model = TextEmbedding::try_new(init_options)
                .map_err(|e| EmbedError::External { source: e })?;

            let sample = model
                .embed(vec!["test".to_string()], None)
                .map_err(|e| EmbedError::External { source: e })?;
            let dimension = sample.first().map(|emb| emb.len()).unwrap_or(0);

            tracing::info!("Model loaded successfully. Dimension: {}", dimension);
            Ok((model, dimension))
        })
        .await??;

    if dimension != expected {
        return Err(EmbedError::invalid_config(format!(
            "model '{name}' produces {dimension} dimensions, configured for {expected}"
        )));
    }
    Ok((Arc::new(Mutex::new(model)), dimension))
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());
                let mut model_guard = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
                model_guard
                    .embed(chunk, None)
                    .map_err(|e| EmbedError::External { source: e })
            })
            .await??;

            all_embeddings.extend(
                batch_embeddings
                    .into_iter()
                    .map(|embedding| to_f16(embedding, self.config.normalize)),
            );
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());
        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.embedding_dimension(), 384);
    }

    #[test]
    fn test_builtin_model_names() {
        assert!(matches!(
            builtin_model("all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(builtin_model("ModernBERT-large").is_err());
    }

    #[tokio::test]
    async fn test_unknown_model_fails_to_initialize() {
        let result = FastEmbedProvider::create(EmbedConfig::new("no-such-model")).await;
        assert!(matches!(result, Err(EmbedError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_slot() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let slots = Arc::new(ModelSlots::<usize>::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slots = Arc::clone(&slots);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    slots
                        .get_or_load("minilm", || async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(384)
                        })
                        .await
                })
            })
            .collect();

        let mut fresh = 0;
        for handle in handles {
            let (dimension, cached) = handle.await.unwrap().unwrap();
            assert_eq!(dimension, 384);
            if !cached {
                fresh += 1;
            }
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(fresh, 1);
        assert_eq!(slots.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_slot_empty() {
        let slots = ModelSlots::<usize>::new();
        let failed = slots
            .get_or_load("broken", || async {
                Err(EmbedError::invalid_config("download interrupted"))
            })
            .await;
        assert!(failed.is_err());
        assert_eq!(slots.len(), 0);

        let (dimension, cached) = slots
            .get_or_load("broken", || async { Ok(768) })
            .await
            .unwrap();
        assert_eq!((dimension, cached), (768, false));

        slots.clear();
        assert_eq!(slots.len(), 0);
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = FastEmbedProvider::new(EmbedConfig::default())
            .create_cache_key()
            .unwrap();
        let key2 = FastEmbedProvider::new(EmbedConfig::default())
            .create_cache_key()
            .unwrap();
        assert_eq!(key1, key2, "Same config should produce same cache key");
        assert!(key1.starts_with("v1:"));

        let key3 = FastEmbedProvider::new(EmbedConfig::default().with_batch_size(8))
            .create_cache_key()
            .unwrap();
        assert_ne!(key1, key3);

        let key4 = FastEmbedProvider::new(EmbedConfig::new("bge-small-en-v1.5"))
            .create_cache_key()
            .unwrap();
        assert_ne!(key1, key4);
    }

    #[tokio::test]
    #[ignore] // Downloads the real model - run with: cargo test test_minilm_download_and_embedding -- --ignored
    async fn test_minilm_download_and_embedding() -> Result<()> {
        let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(FastEmbedProvider::cache_size(), 1);
        assert_eq!(provider.embedding_dimension(), 384);

        let texts = vec![
            "Passengers in first class survived more often.".to_string(),
            "Survival rates were highest for first class travellers.".to_string(),
            "The cabin column is mostly empty.".to_string(),
        ];
        let batch = provider.embed_texts(&texts).await?;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.dimension, 384);
        for embedding in &batch.embeddings {
            assert!(embedding.iter().all(|x| x.to_f32().is_finite()));
        }

        let sim = |a: &[f16], b: &[f16]| -> f32 {
            a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
        };
        let related = sim(&batch.embeddings[0], &batch.embeddings[1]);
        let unrelated = sim(&batch.embeddings[0], &batch.embeddings[2]);
        assert!(related > unrelated, "{related} <= {unrelated}");

        // second provider reuses the cached model
        let again = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(FastEmbedProvider::cache_size(), 1);
        assert_eq!(again.embed_text("fare").await?.len(), 384);

        FastEmbedProvider::clear_cache();
        assert_eq!(FastEmbedProvider::cache_size(), 0);
        Ok(())
    }
}
