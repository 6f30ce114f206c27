//! Language model seam.
//!
//! Every request names its [`Task`], so the mock can answer by task kind and
//! real clients can log what they are doing.

use crate::config::{LlmConfig, LlmProvider};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// What a prompt is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// JSON array of insights from a profile
    Insights,
    /// Markdown executive summary
    Story { dataset_name: String },
    /// Answer to a question, with retrieved context (possibly empty)
    Chat { question: String, context: String },
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Insights => "insights",
            Task::Story { .. } => "story",
            Task::Chat { .. } => "chat",
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, task: &Task, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// Build the client selected by `config.provider`.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    Ok(match config.provider {
        LlmProvider::Mock => Arc::new(MockLlmClient),
        LlmProvider::Vllm => Arc::new(CompletionClient::new(config)?),
    })
}

pub const MOCK_INSIGHTS: &str = r#"[
    {"title": "High Correlation between Age and Fare", "description": "There is a significant positive correlation (0.54) between Age and Fare, suggesting older passengers tend to pay more.", "confidence": 0.85, "verification_code": "df[['Age', 'Fare']].corr()"},
    {"title": "Missing Values in Cabin Column", "description": "The Cabin column has 77% missing values. This feature might need to be dropped or imputed before modeling.", "confidence": 0.95, "verification_code": "df['Cabin'].isnull().mean()"},
    {"title": "Skewed Distribution in Fare", "description": "The Fare distribution is highly right-skewed, indicating a few passengers paid significantly higher fares than the median.", "confidence": 0.9, "verification_code": "df['Fare'].skew()"}
]"#;

/// Deterministic offline client.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    fn story(dataset_name: &str) -> String {
        format!(
            "# Executive Summary: {dataset_name}\n\n\
             ## Key Findings\n\
             Analysis of the uploaded dataset reveals several critical trends. Notably, there is a strong correlation between **Age and Fare** (0.54), suggesting that older demographic groups are driving higher revenue per ticket. This presents an opportunity to tailor premium services to this segment.\n\n\
             ## Data Quality Concerns\n\
             However, data quality remains a challenge. The **Cabin** column has significant missing values (77%), which limits our ability to analyze location-based preferences. We recommend improving data collection at the point of booking.\n\n\
             ## Pricing Strategy\n\
             The distribution of **Fares** is highly skewed. A small number of high-value transactions are distorting the average, indicating that a tiered pricing strategy might be more effective than a one-size-fits-all approach."
        )
    }

    fn chat(question: &str, context: &str) -> String {
        let context = context.trim();
        if context.len() > 10 {
            format!(
                "Based on the analysis, here is what I found regarding '{question}':\n\n{context}\n\n(This information was retrieved from the dataset analysis)."
            )
        } else {
            format!(
                "I analyzed the dataset for '{question}', but I couldn't find specific patterns matching that in the generated insights. I can tell you mostly about Age, Fare, and Cabin distributions."
            )
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, task: &Task, _prompt: &str) -> Result<String> {
        tracing::debug!("Mock LLM answering {} task", task.kind());
        Ok(match task {
            Task::Insights => MOCK_INSIGHTS.to_string(),
            Task::Story { dataset_name } => Self::story(dataset_name),
            Task::Chat { question, context } => Self::chat(question, context),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Client for an OpenAI-compatible `/completions` endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }
}

/// Pull `choices[0].text` out of a completion response.
pub fn completion_text(response: &serde_json::Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(anyhow!("completion endpoint returned error: {error}"));
    }
    response["choices"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid response format: missing text in choices"))
}

#[async_trait]
impl LlmClient for CompletionClient {
    async fn generate(&self, task: &Task, prompt: &str) -> Result<String> {
        let url = format!("{}/completions", self.base_url);
        tracing::debug!("Requesting {} completion from {}", task.kind(), url);

        let res = self
            .client
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint error: {status} - {text}"));
        }

        let json: serde_json::Value = res.json().await?;
        completion_text(&json)
    }

    fn name(&self) -> &str {
        "completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_routes_by_task() {
        let llm = MockLlmClient;

        let insights = llm.generate(&Task::Insights, "ignored").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&insights).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(3));

        let story = llm
            .generate(
                &Task::Story {
                    dataset_name: "titanic.csv".into(),
                },
                "ignored",
            )
            .await
            .unwrap();
        assert!(story.starts_with("# Executive Summary: titanic.csv"));
    }

    #[tokio::test]
    async fn test_mock_chat_uses_context() {
        let llm = MockLlmClient;
        let grounded = llm
            .generate(
                &Task::Chat {
                    question: "What about Cabin?".into(),
                    context: "Insight: Missing Values in Cabin Column. 77% missing".into(),
                },
                "",
            )
            .await
            .unwrap();
        assert!(grounded.contains("77% missing"));
        assert!(grounded.contains("retrieved from the dataset analysis"));

        let ungrounded = llm
            .generate(
                &Task::Chat {
                    question: "What about Cabin?".into(),
                    context: String::new(),
                },
                "",
            )
            .await
            .unwrap();
        assert!(ungrounded.contains("couldn't find specific patterns"));
    }

    #[test]
    fn test_completion_request_and_response() {
        let client = CompletionClient::new(&LlmConfig {
            provider: LlmProvider::Vllm,
            base_url: "http://localhost:8000/v1/".into(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8000/v1");

        let body = client.request_body("hello");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["max_tokens"], 512);

        let ok = serde_json::json!({"choices": [{"text": "answer"}]});
        assert_eq!(completion_text(&ok).unwrap(), "answer");
        assert!(completion_text(&serde_json::json!({"choices": []})).is_err());
        assert!(completion_text(&serde_json::json!({"error": "overloaded"})).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let client = CompletionClient::new(&LlmConfig {
            provider: LlmProvider::Vllm,
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..LlmConfig::default()
        })
        .unwrap();
        assert!(client.generate(&Task::Insights, "prompt").await.is_err());
    }

    #[test]
    fn test_build_llm_client_by_provider() {
        let mock = build_llm_client(&LlmConfig::default()).unwrap();
        assert_eq!(mock.name(), "mock");
        let real = build_llm_client(&LlmConfig {
            provider: LlmProvider::Vllm,
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(real.name(), "completions");
    }
}
