use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Dataset not analyzed yet: {reason}")]
    NotAnalyzed { reason: String },

    #[error("Insights required before story generation")]
    InsightsRequired,

    #[error("LLM generation failed")]
    Llm(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
