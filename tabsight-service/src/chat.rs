//! Grounded question answering over a dataset's indexed analysis.

use crate::llm::{LlmClient, Task};
use serde::Serialize;
use tabsight_retriever::retrieval::RetrievalGateway;

pub const CONTEXT_SEPARATOR: &str = "\n---\n";

pub const APOLOGY_RESPONSE: &str =
    "I encountered an error processing your request. Please try again.";

pub const UNGROUNDED_CAVEAT: &str = "Note: no indexed analysis was available for this dataset, so this answer is not grounded in its insights or story.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub response: String,
    /// Whether any retrieved context went into the prompt
    pub grounded: bool,
    pub sources: Vec<String>,
}

pub fn build_chat_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an AI assistant helping a user understand a dataset.\n\n\
         Relevant Context from analysis:\n{context}\n\n\
         User Question: {question}\n\n\
         Answer the question based on the context provided. If the context doesn't have the answer, use your general knowledge but mention that the specific data wasn't found in the index."
    )
}

/// Answer `question` for `dataset_id`. Retrieval failures degrade to an
/// ungrounded answer; generation failures to [`APOLOGY_RESPONSE`].
pub async fn answer_question(
    gateway: &RetrievalGateway,
    llm: &dyn LlmClient,
    dataset_id: &str,
    question: &str,
    limit: Option<usize>,
) -> ChatAnswer {
    let sources = gateway.search_or_empty(dataset_id, question, limit).await;
    let grounded = !sources.is_empty();
    let context = sources.join(CONTEXT_SEPARATOR);

    let prompt = build_chat_prompt(question, &context);
    let task = Task::Chat {
        question: question.to_string(),
        context,
    };

    let response = match llm.generate(&task, &prompt).await {
        Ok(answer) if grounded => answer,
        Ok(answer) => format!("{}\n\n{}", answer.trim_end(), UNGROUNDED_CAVEAT),
        Err(e) => {
            tracing::error!("Chat generation for dataset {} failed: {:#}", dataset_id, e);
            APOLOGY_RESPONSE.to_string()
        }
    };

    ChatAnswer {
        response,
        grounded,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_prompt_layout() {
        let prompt = build_chat_prompt("Why?", "a\n---\nb");
        assert!(prompt.contains("Relevant Context from analysis:\na\n---\nb\n\nUser Question: Why?"));
    }
}
