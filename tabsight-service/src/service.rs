//! Dataset flows: profile, insights, story, chat.

use crate::chat::{ChatAnswer, answer_question};
use crate::context::AppContext;
use crate::error::{Result, ServiceError};
use crate::insights::{self, Insight, insight_documents};
use crate::story::{self, story_documents};
use serde::Serialize;
use std::path::Path;
use tabsight_profile::{ProfileValue, Profiler, error_profile};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub dataset_id: String,
    pub name: String,
    pub profile: serde_json::Value,
    pub insights: Vec<Insight>,
    pub story: Option<String>,
    /// Points stored for the dataset once the run finished
    pub indexed: usize,
}

#[derive(Debug, Clone)]
pub struct DatasetService {
    context: AppContext,
    profiler: Profiler,
}

impl DatasetService {
    pub fn new(context: AppContext) -> Self {
        Self {
            context,
            profiler: Profiler::default(),
        }
    }

    pub fn with_profiler(self, profiler: Profiler) -> Self {
        Self { profiler, ..self }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Profile `location` off the async runtime. Never fails; unreadable
    /// sources yield an `{"error": ...}` profile.
    pub async fn analyze(&self, location: &str) -> ProfileValue {
        let profiler = self.profiler.clone();
        let owned = location.to_string();
        match tokio::task::spawn_blocking(move || profiler.analyze(&owned)).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!("Profiling task for {} failed: {}", location, e);
                error_profile(e.to_string())
            }
        }
    }

    /// Derive insights from a completed profile and index them for
    /// `dataset_id`. Indexing failures are logged, not returned.
    pub async fn generate_insights(
        &self,
        dataset_id: &str,
        profile: &ProfileValue,
    ) -> Result<Vec<Insight>> {
        check_analyzed(profile)?;

        let insights = insights::generate_insights(self.context.llm.as_ref(), profile).await;
        tracing::info!(
            "Generated {} insights for dataset {}",
            insights.len(),
            dataset_id
        );

        let (texts, metadatas) = insight_documents(&insights);
        self.context
            .gateway
            .index_text_best_effort(dataset_id, &texts, &metadatas)
            .await;
        Ok(insights)
    }

    /// Write the executive summary and index its paragraphs.
    pub async fn generate_story(
        &self,
        dataset_id: &str,
        dataset_name: &str,
        insights: &[Insight],
    ) -> Result<String> {
        if insights.is_empty() {
            return Err(ServiceError::InsightsRequired);
        }

        let story = story::generate_story(self.context.llm.as_ref(), dataset_name, insights)
            .await
            .map_err(ServiceError::Llm)?;

        let (paragraphs, metadatas) = story_documents(&story);
        self.context
            .gateway
            .index_text_best_effort(dataset_id, &paragraphs, &metadatas)
            .await;
        Ok(story)
    }

    pub async fn chat(&self, dataset_id: &str, question: &str) -> ChatAnswer {
        answer_question(
            &self.context.gateway,
            self.context.llm.as_ref(),
            dataset_id,
            question,
            None,
        )
        .await
    }

    /// Profile, insights, story and indexing in one go. The story is skipped
    /// when no insights came back.
    pub async fn run_pipeline(
        &self,
        location: &str,
        dataset_id: &str,
        name: Option<&str>,
    ) -> Result<AnalysisReport> {
        let name = name.map(str::to_string).unwrap_or_else(|| display_name(location));

        let profile = self.analyze(location).await;
        let insights = self.generate_insights(dataset_id, &profile).await?;
        let story = if insights.is_empty() {
            tracing::warn!("No insights for dataset {}; skipping story", dataset_id);
            None
        } else {
            Some(self.generate_story(dataset_id, &name, &insights).await?)
        };

        let indexed = match self.context.gateway.count(dataset_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Could not count points for dataset {}: {}", dataset_id, e);
                0
            }
        };

        Ok(AnalysisReport {
            dataset_id: dataset_id.to_string(),
            name,
            profile: profile.to_json(),
            insights,
            story,
            indexed,
        })
    }
}

/// A profile is usable once it is a non-empty map without an `error` entry.
pub fn check_analyzed(profile: &ProfileValue) -> Result<()> {
    let Some(map) = profile.as_map() else {
        return Err(ServiceError::NotAnalyzed {
            reason: "profile is not an object".to_string(),
        });
    };
    if let Some(error) = map.get("error") {
        return Err(ServiceError::NotAnalyzed {
            reason: error.as_str().unwrap_or("profiling failed").to_string(),
        });
    }
    if map.is_empty() {
        return Err(ServiceError::NotAnalyzed {
            reason: "profile is empty".to_string(),
        });
    }
    Ok(())
}

fn display_name(location: &str) -> String {
    let path = location.strip_prefix("file://").unwrap_or(location);
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_analyzed() {
        assert!(check_analyzed(&ProfileValue::Null).is_err());
        assert!(check_analyzed(&ProfileValue::map()).is_err());

        let err = check_analyzed(&error_profile("File not found")).unwrap_err();
        assert_eq!(err.to_string(), "Dataset not analyzed yet: File not found");

        let mut ok = tabsight_profile::ValueMap::new();
        ok.insert("row_count".to_string(), ProfileValue::from(3usize));
        assert!(check_analyzed(&ProfileValue::Map(ok)).is_ok());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("/data/titanic.csv"), "titanic.csv");
        assert_eq!(display_name("file:///data/sales.csv"), "sales.csv");
        assert_eq!(display_name("/"), "/");
    }
}
