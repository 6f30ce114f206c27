//! Service configuration: TOML file, then environment, then CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabsight_embed::{EmbedBackend, EmbedConfig};
use tabsight_retriever::retrieval::gateway::{DEFAULT_COLLECTION, DEFAULT_SEARCH_LIMIT};
use tabsight_retriever::storage::IndexBackend;

pub const ENV_EMBED_BACKEND: &str = "TABSIGHT_EMBED_BACKEND";
pub const ENV_INDEX_PATH: &str = "TABSIGHT_INDEX_PATH";
pub const ENV_LLM_PROVIDER: &str = "LLM_PROVIDER";
pub const ENV_LLM_BASE_URL: &str = "LLM_BASE_URL";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub embedding: EmbeddingSection,
    pub index: IndexBackend,
    pub llm: LlmConfig,
    pub retrieval: RetrievalSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub backend: EmbedBackend,
    #[serde(flatten)]
    pub model: EmbedConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Canned responses chosen by task kind
    #[default]
    Mock,
    /// OpenAI-compatible `/completions` endpoint (vLLM and friends)
    Vllm,
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(LlmProvider::Mock),
            "vllm" | "openai" => Ok(LlmProvider::Vllm),
            other => anyhow::bail!("unknown LLM provider '{other}' (expected 'mock' or 'vllm')"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Mock,
            base_url: "http://localhost:8000/v1".to_string(),
            model: "meta-llama/Llama-2-7b-chat-hf".to_string(),
            max_tokens: 512,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub collection: String,
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            limit: DEFAULT_SEARCH_LIMIT,
            timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// Parse a TOML document; missing sections and keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid service configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults or `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(ENV_EMBED_BACKEND) {
            self.embedding.backend = value
                .parse()
                .with_context(|| format!("invalid {ENV_EMBED_BACKEND}"))?;
        }
        if let Some(value) = get(ENV_INDEX_PATH) {
            self.index = index_backend_from_str(&value);
        }
        if let Some(value) = get(ENV_LLM_PROVIDER) {
            self.llm.provider = value
                .parse()
                .with_context(|| format!("invalid {ENV_LLM_PROVIDER}"))?;
        }
        if let Some(value) = get(ENV_LLM_BASE_URL) {
            self.llm.base_url = value;
        }
        if let Some(value) = get(ENV_LLM_MODEL) {
            self.llm.model = value;
        }
        Ok(())
    }
}

/// `memory` selects the stand-in, `:memory:` an in-memory SQLite database,
/// anything else a database file.
pub fn index_backend_from_str(value: &str) -> IndexBackend {
    match value.trim() {
        "memory" | "in-memory" | "mock" => IndexBackend::InMemory,
        ":memory:" => IndexBackend::SqliteMemory,
        path => IndexBackend::Sqlite {
            path: PathBuf::from(path),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.embedding.backend, EmbedBackend::FastEmbed);
        assert_eq!(config.embedding.model.dimension, 384);
        assert_eq!(config.llm.provider, LlmProvider::Mock);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.retrieval.collection, "insights");
        assert_eq!(config.retrieval.limit, 3);
    }

    #[test]
    fn test_partial_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [embedding]
            backend = "hash"
            dimension = 64

            [index]
            type = "in_memory"

            [llm]
            provider = "vllm"
            base_url = "http://gpu-box:8000/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.backend, EmbedBackend::Hash);
        assert_eq!(config.embedding.model.dimension, 64);
        assert_eq!(config.embedding.model.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.index, IndexBackend::InMemory);
        assert_eq!(config.llm.provider, LlmProvider::Vllm);
        assert_eq!(config.llm.base_url, "http://gpu-box:8000/v1");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.retrieval, RetrievalSection::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ServiceConfig::from_toml_str("[llm]\nprovider = \"gpt\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_EMBED_BACKEND, "hash"),
            (ENV_INDEX_PATH, "/data/index.db"),
            (ENV_LLM_PROVIDER, "vllm"),
            (ENV_LLM_MODEL, "mistral-7b"),
            (ENV_LLM_BASE_URL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.embedding.backend, EmbedBackend::Hash);
        assert_eq!(
            config.index,
            IndexBackend::Sqlite {
                path: PathBuf::from("/data/index.db")
            }
        );
        assert_eq!(config.llm.provider, LlmProvider::Vllm);
        assert_eq!(config.llm.model, "mistral-7b");
        // blank values are ignored
        assert_eq!(config.llm.base_url, LlmConfig::default().base_url);
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_LLM_PROVIDER).then(|| "claude".to_string()))
            .unwrap_err();
        assert!(format!("{err:#}").contains(ENV_LLM_PROVIDER));
    }

    #[test]
    fn test_index_backend_strings() {
        assert_eq!(index_backend_from_str("memory"), IndexBackend::InMemory);
        assert_eq!(index_backend_from_str(":memory:"), IndexBackend::SqliteMemory);
        assert_eq!(
            index_backend_from_str("idx.db"),
            IndexBackend::Sqlite {
                path: PathBuf::from("idx.db")
            }
        );
    }
}
