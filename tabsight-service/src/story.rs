//! Executive-summary story built from insights.

use crate::insights::Insight;
use crate::llm::{LlmClient, Task};
use anyhow::Result;
use tabsight_retriever::retrieval::gateway::source_metadata;
use tabsight_retriever::storage::Metadata;

pub const STORY_SOURCE: &str = "story";

pub fn build_story_prompt(dataset_name: &str, insights: &[Insight]) -> String {
    let listed = insights
        .iter()
        .map(|insight| {
            let confidence = insight
                .confidence
                .map(|c| c.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            format!(
                "- {}: {} (Conf: {})",
                insight.title, insight.description, confidence
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Chief Data Officer writing an executive summary for a new dataset report: \"{dataset_name}\".\n\n\
         Here are the key automated insights discovered:\n{listed}\n\n\
         Write a 3-paragraph executive summary in Markdown format.\n\
         - Paragraph 1: Overview and most critical finding.\n\
         - Paragraph 2: Secondary findings and data quality notes.\n\
         - Paragraph 3: Strategic recommendations based on the data.\n\n\
         Use bolding for key terms. Do not include a greeting or sign-off."
    )
}

pub async fn generate_story(
    llm: &dyn LlmClient,
    dataset_name: &str,
    insights: &[Insight],
) -> Result<String> {
    let prompt = build_story_prompt(dataset_name, insights);
    let task = Task::Story {
        dataset_name: dataset_name.to_string(),
    };
    llm.generate(&task, &prompt).await
}

/// Blank-line separated paragraphs; whitespace-only pieces are dropped.
pub fn story_paragraphs(story: &str) -> Vec<String> {
    story
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn story_documents(story: &str) -> (Vec<String>, Vec<Metadata>) {
    let paragraphs = story_paragraphs(story);
    let metadatas = paragraphs
        .iter()
        .map(|_| source_metadata(STORY_SOURCE))
        .collect();
    (paragraphs, metadatas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn insight(title: &str, confidence: Option<f64>) -> Insight {
        Insight {
            title: title.to_string(),
            description: format!("{title} description"),
            confidence,
            verification_code: None,
        }
    }

    #[test]
    fn test_prompt_lists_insights() {
        let prompt = build_story_prompt(
            "sales.csv",
            &[insight("Trend", Some(0.9)), insight("Gap", None)],
        );
        assert!(prompt.contains("report: \"sales.csv\""));
        assert!(prompt.contains("- Trend: Trend description (Conf: 0.9)"));
        assert!(prompt.contains("- Gap: Gap description (Conf: n/a)"));
    }

    #[test]
    fn test_story_paragraphs_drop_blank_pieces() {
        let story = "\n# Title\n\nFirst para.\n\n   \n\nSecond para.\n\n";
        assert_eq!(
            story_paragraphs(story),
            vec!["\n# Title", "First para.", "Second para."]
        );
    }

    #[tokio::test]
    async fn test_mock_story_splits_into_sections() {
        let story = generate_story(&MockLlmClient, "titanic.csv", &[insight("T", None)])
            .await
            .unwrap();
        let (paragraphs, metadatas) = story_documents(&story);
        assert_eq!(paragraphs.len(), 4);
        assert!(paragraphs[0].contains("titanic.csv"));
        assert!(metadatas.iter().all(|m| m["source"] == "story"));
    }
}
