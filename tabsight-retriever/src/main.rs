use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tabsight_embed::{EmbedBackend, EmbedConfig, load_provider};
use tabsight_retriever::retrieval::gateway::source_metadata;
use tabsight_retriever::retrieval::{GatewayConfig, RetrievalGateway};
use tabsight_retriever::storage::{DatasetFilter, SqliteIndex, VectorIndex};
use tracing_subscriber::EnvFilter;

/// A CLI tool to inspect and populate a tabsight vector index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite index file
    #[arg(short, long, default_value = "tabsight-index.db")]
    db: PathBuf,

    /// Collection holding all datasets
    #[arg(short, long, default_value = "insights")]
    collection: String,

    /// Embedding backend: fastembed or hash
    #[arg(short, long, default_value = "fastembed")]
    embedder: EmbedBackend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index texts for a dataset
    Add {
        #[arg(long)]
        dataset: String,
        /// Value stored as the `source` metadata of every text
        #[arg(long, default_value = "manual")]
        source: String,
        /// Texts to index
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Retrieve the texts most relevant to a query
    Search {
        #[arg(long)]
        dataset: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
        query: String,
    },
    /// Count indexed texts, optionally for one dataset
    Count {
        #[arg(long)]
        dataset: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    dataset: &'a str,
    query: &'a str,
    results: Vec<String>,
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

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let index = Arc::new(SqliteIndex::open(&args.db).await?);

    match args.command {
        Commands::Count { dataset } => {
            let filter = match &dataset {
                Some(id) => DatasetFilter::dataset(id.clone()),
                None => DatasetFilter::all(),
            };
            // no collection yet means nothing was ever indexed
            let n = if index.collection_exists(&args.collection).await? {
                index.count(&args.collection, &filter).await?
            } else {
                0
            };
            println!("{n}");
            Ok(())
        }
        Commands::Add {
            dataset,
            source,
            texts,
        } => {
            let gateway = open_gateway(&args.collection, args.embedder, index).await;
            let metadatas = vec![source_metadata(&source); texts.len()];
            let written = gateway.index_text(&dataset, &texts, &metadatas).await?;
            println!("Indexed {written} texts for dataset {dataset}");
            Ok(())
        }
        Commands::Search {
            dataset,
            limit,
            format,
            query,
        } => {
            let gateway = open_gateway(&args.collection, args.embedder, index).await;
            let results = gateway.search(&dataset, &query, Some(limit)).await?;
            match format {
                OutputFormat::Json => {
                    let output = SearchOutput {
                        dataset: &dataset,
                        query: &query,
                        results,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} results:", results.len());
                    for (rank, text) in results.iter().enumerate() {
                        println!("  {}. {}", rank + 1, text);
                    }
                }
            }
            Ok(())
        }
    }
}

async fn open_gateway(
    collection: &str,
    backend: EmbedBackend,
    index: Arc<SqliteIndex>,
) -> RetrievalGateway {
    let embedder = load_provider(&EmbedConfig::default(), backend).await;
    let config = GatewayConfig::default().with_collection(collection);
    RetrievalGateway::new(embedder, index, config)
}
