//! Deterministic stand-in provider based on signed feature hashing.
//!
//! Produces correctly shaped, unit-length vectors without any model files.
//! Texts sharing words land near each other, which is enough for retrieval
//! to behave sensibly in tests and offline deployments.

use crate::config::DEFAULT_DIMENSION;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingResult, to_f16};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
}

impl HashEmbedProvider {
    /// A zero dimension is replaced by the default model width.
    pub fn new(dimension: usize) -> Self {
        let dimension = if dimension == 0 {
            DEFAULT_DIMENSION
        } else {
            dimension
        };
        Self { dimension }
    }

    /// Embed synchronously. Text without word characters maps to the zero vector.
    pub fn embed_sync(&self, text: &str) -> Vec<f16> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let mut hasher = FnvHasher::default();
            hasher.write(token.as_bytes());
            let hash = hasher.finish();
            let index = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            buckets[index] += sign;
        }
        to_f16(buckets, true)
    }
}

impl Default for HashEmbedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings = texts.iter().map(|t| self.embed_sync(t)).collect();
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f16], b: &[f16]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
    }

    #[tokio::test]
    async fn test_hash_embeddings_are_deterministic_and_unit_length() {
        let provider = HashEmbedProvider::new(64);
        let a = provider.embed_text("Fare correlates with Pclass").await.unwrap();
        let b = provider.embed_text("fare CORRELATES with pclass").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-2);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let provider = HashEmbedProvider::default();
        let query = provider.embed_sync("survival rate by passenger class");
        let near = provider.embed_sync("passenger class strongly predicts survival");
        let far = provider.embed_sync("cabin letters are mostly missing");
        assert!(dot(&query, &near) > dot(&query, &far));
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_handles_empty() {
        let provider = HashEmbedProvider::new(32);
        let texts = vec!["one".to_string(), "two".to_string(), String::new()];
        let result = provider.embed_texts(&texts).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.dimension, 32);
        assert_eq!(result.embeddings[0], provider.embed_sync("one"));
        assert!(result.embeddings[2].iter().all(|x| x.to_f32() == 0.0));

        let none = provider.embed_texts(&[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_zero_dimension_uses_default() {
        assert_eq!(HashEmbedProvider::new(0).embedding_dimension(), DEFAULT_DIMENSION);
        assert_eq!(HashEmbedProvider::default().provider_name(), "hash");
    }
}
