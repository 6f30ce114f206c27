//! Insights: short findings the LLM derives from a dataset profile.

use crate::llm::{LlmClient, Task};
use serde::{Deserialize, Serialize};
use tabsight_profile::ProfileValue;
use tabsight_retriever::storage::Metadata;
use tabsight_retriever::retrieval::gateway::source_metadata;

pub const INSIGHT_SOURCE: &str = "insight";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub verification_code: Option<String>,
}

impl Insight {
    /// Text stored in the index for this insight.
    pub fn document(&self) -> String {
        format!("Insight: {}. {}", self.title, self.description)
    }
}

fn pretty_section(profile: &ProfileValue, key: &str) -> String {
    let section = profile
        .get(key)
        .map(ProfileValue::to_json)
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    serde_json::to_string_pretty(&section).unwrap_or_else(|_| "{}".to_string())
}

pub fn build_insights_prompt(profile: &ProfileValue) -> String {
    format!(
        "You are an expert Data Analyst. Analyze the following dataset summary and correlation matrix.\n\n\
         Summary Stats:\n{}\n\n\
         Correlation Matrix:\n{}\n\n\
         Provide 3 distinct, interesting business or data quality insights.\n\
         Return the response as a valid JSON array of objects with keys: \"title\", \"description\", \"confidence\" (0-1), \"verification_code\" (pandas/python).\n\
         Do not output any markdown formatting, just the raw JSON string.",
        pretty_section(profile, "summary"),
        pretty_section(profile, "correlation"),
    )
}

/// Strip surrounding whitespace and a Markdown code fence, if any.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse an LLM response into insights. Anything unparseable yields an
/// empty list.
pub fn parse_insights(response: &str) -> Vec<Insight> {
    match serde_json::from_str::<Vec<Insight>>(strip_code_fence(response)) {
        Ok(insights) => insights,
        Err(e) => {
            tracing::warn!("Failed to parse LLM insights response: {}: {}", e, response);
            Vec::new()
        }
    }
}

pub async fn generate_insights(llm: &dyn LlmClient, profile: &ProfileValue) -> Vec<Insight> {
    let prompt = build_insights_prompt(profile);
    match llm.generate(&Task::Insights, &prompt).await {
        Ok(response) => parse_insights(&response),
        Err(e) => {
            tracing::warn!("Insight generation failed: {:#}", e);
            Vec::new()
        }
    }
}

/// Index texts and metadata for `insights`.
pub fn insight_documents(insights: &[Insight]) -> (Vec<String>, Vec<Metadata>) {
    insights
        .iter()
        .map(|insight| (insight.document(), source_metadata(INSIGHT_SOURCE)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use tabsight_profile::ValueMap;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[2]\n```\n"), "[2]");
        assert_eq!(strip_code_fence("```json\n[3]"), "[3]");
    }

    #[test]
    fn test_parse_insights_accepts_fenced_json() {
        let response = "```json\n[{\"title\": \"T\", \"description\": \"D\", \"confidence\": 0.5}]\n```";
        let insights = parse_insights(response);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].confidence, Some(0.5));
        assert_eq!(insights[0].verification_code, None);
        assert_eq!(insights[0].document(), "Insight: T. D");
    }

    #[test]
    fn test_parse_insights_rejects_prose() {
        assert!(parse_insights("Here are some insights: the data is nice").is_empty());
        assert!(parse_insights("{\"title\": \"not a list\"}").is_empty());
    }

    #[test]
    fn test_prompt_embeds_summary_and_correlation() {
        let mut summary = ValueMap::new();
        summary.insert("Age".to_string(), ProfileValue::from(29.5));
        let mut profile = ValueMap::new();
        profile.insert("summary".to_string(), ProfileValue::Map(summary));
        let prompt = build_insights_prompt(&ProfileValue::Map(profile));

        assert!(prompt.contains("\"Age\": 29.5"));
        assert!(prompt.contains("Correlation Matrix:\n{}"));
    }

    #[tokio::test]
    async fn test_generate_insights_with_mock() {
        let insights = generate_insights(&MockLlmClient, &ProfileValue::map()).await;
        assert_eq!(insights.len(), 3);
        let (texts, metadatas) = insight_documents(&insights);
        assert!(texts[1].starts_with("Insight: Missing Values in Cabin Column."));
        assert_eq!(metadatas[1]["source"], "insight");
    }
}
