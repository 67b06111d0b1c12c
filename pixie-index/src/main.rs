//! `pixie` command-line interface.
//!
//! Thin adapter over [`ImageSearchService`]: one process, one command.
//! Indexing runs to completion in the foreground so the summary (and any
//! error count) lands before the process exits.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pixie_index::config::ServiceConfig;
use pixie_index::indexing::RunOutcome;
use pixie_index::service::ImageSearchService;

#[derive(Parser)]
#[command(name = "pixie", about = "Semantic image search over a directory tree")]
struct Cli {
    /// Root directory of the image tree
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Database path (defaults to <root>/.pixie/index.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index images under a directory (defaults to the root)
    Index {
        /// Directory to index
        dir: Option<PathBuf>,
    },
    /// Show indexing progress
    Status,
    /// Search indexed images with a text query
    Search {
        /// Natural-language query
        query: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Drop results scoring below this similarity
        #[arg(long, default_value_t = 0.2)]
        min_score: f32,
    },
    /// Show index size and model health
    Stats,
    /// Resolve a relative image path inside the root
    Show {
        /// Path relative to the image root
        relative_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::new(&cli.root);
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    let service = ImageSearchService::create(config).await?;

    match cli.command {
        Command::Index { dir } => {
            match service.run_indexing(dir.as_deref()).await? {
                RunOutcome::Completed { indexed, errors } => {
                    println!("Indexed {indexed} images ({errors} errors)");
                }
                RunOutcome::AlreadyRunning => {
                    println!("An indexing run is already in progress");
                }
            }
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&service.indexing_status())?);
        }
        Command::Search {
            query,
            limit,
            min_score,
        } => {
            let response = service.search(&query, limit, min_score).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Stats => {
            let stats = service.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Show { relative_path } => {
            let resolved = service.resolve_image(&relative_path).await?;
            println!("{}", resolved.display());
        }
    }

    Ok(())
}
