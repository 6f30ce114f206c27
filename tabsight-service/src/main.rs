use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tabsight_embed::EmbedBackend;
use tabsight_service::config::{LlmProvider, index_backend_from_str};
use tabsight_service::{AppContext, DatasetService, ServiceConfig};
use tracing_subscriber::EnvFilter;

/// Profile CSV datasets and ask questions about them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Embedding backend override: fastembed or hash
    #[arg(long, global = true)]
    embedder: Option<EmbedBackend>,

    /// Index override: a SQLite file, ":memory:" or "memory"
    #[arg(long, global = true)]
    index: Option<String>,

    /// LLM provider override: mock or vllm
    #[arg(long, global = true)]
    llm: Option<LlmProvider>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the sanitized profile of a dataset as JSON
    Profile { location: String },
    /// Profile, generate insights and a story, and index both
    Analyze {
        location: String,
        /// Identifier the indexed texts are stored under (random when omitted)
        #[arg(long)]
        dataset_id: Option<String>,
        /// Display name used in the story (file name when omitted)
        #[arg(long)]
        name: Option<String>,
    },
    /// Answer a question from a dataset's indexed analysis
    Chat { dataset_id: String, question: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(backend) = args.embedder {
        config.embedding.backend = backend;
    }
    if let Some(index) = &args.index {
        config.index = index_backend_from_str(index);
    }
    if let Some(provider) = args.llm {
        config.llm.provider = provider;
    }
    Ok(config)
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Commands::Profile { location } = &args.command {
        let profile = tabsight_profile::analyze_dataset(location);
        println!("{}", serde_json::to_string_pretty(&profile)?);
        if let Some(error) = profile.get("error").and_then(|e| e.as_str()) {
            anyhow::bail!("profiling {location} failed: {error}");
        }
        return Ok(());
    }

    let config = load_config(&args)?;
    let context = AppContext::initialize(&config)
        .await
        .context("initializing service")?;
    let service = DatasetService::new(context);

    match args.command {
        Commands::Profile { .. } => Ok(()),
        Commands::Analyze {
            location,
            dataset_id,
            name,
        } => {
            let dataset_id = dataset_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let report = service
                .run_pipeline(&location, &dataset_id, name.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Chat {
            dataset_id,
            question,
        } => {
            let answer = service.chat(&dataset_id, &question).await;
            println!("{}", answer.response);
            if !answer.grounded {
                tracing::info!("No indexed context found for dataset {}", dataset_id);
            }
            Ok(())
        }
    }
}
