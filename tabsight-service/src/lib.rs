//! tabsight-service: dataset analysis flows on top of the profiler and the
//! retrieval gateway
//!
//! ## Key Modules
//!
//! - **[`context`]**: [`AppContext`], built once at startup
//! - **[`llm`]**: the [`llm::LlmClient`] seam with mock and completion clients
//! - **[`insights`]**, **[`story`]**, **[`chat`]**: the individual flows
//! - **[`service`]**: [`DatasetService`] tying them together
//!
//! ## Flow
//!
//! ```text
//! CSV → profile → insights ─┬→ story ─→ index (source=story)
//!                           └────────→ index (source=insight)
//! question → search(dataset) → context → LLM → answer
//! ```

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod insights;
pub mod llm;
pub mod service;
pub mod story;

pub use chat::ChatAnswer;
pub use config::ServiceConfig;
pub use context::AppContext;
pub use error::{Result, ServiceError};
pub use insights::Insight;
pub use service::{AnalysisReport, DatasetService};
