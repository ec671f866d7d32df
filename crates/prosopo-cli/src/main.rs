//! Prosopo CLI - Command-line interface
//!
//! Usage:
//!   prosopo link --authority <file> --input <dir> --output <dir>
//!   prosopo merge --authority <file> [--export <dir>] [--documents <dir>] --output <file>
//!   prosopo reconcile --documents <dir> --cache <file>
//!   prosopo filter --input <dir> --output <dir> [--strict]
//!   prosopo stats --graph <file>

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prosopo_core::AppConfig;

#[derive(Parser)]
#[command(name = "prosopo")]
#[command(about = "Prosopographical knowledge-graph pipeline CLI")]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link extracted mentions against the authority file
    Link {
        /// Authority JSON file
        #[arg(long)]
        authority: PathBuf,

        /// Directory of per-document extraction JSON files
        #[arg(long)]
        input: PathBuf,

        /// Directory for linked document output
        #[arg(long)]
        output: PathBuf,
    },
    /// Merge authority, export and extractions into the unified graph
    Merge {
        /// Authority JSON file
        #[arg(long)]
        authority: PathBuf,

        /// External export directory (qids.csv + data_pages/)
        #[arg(long)]
        export: Option<PathBuf>,

        /// Directory of linked document JSON files
        #[arg(long)]
        documents: Option<PathBuf>,

        /// Output file for the unified graph
        #[arg(long)]
        output: PathBuf,
    },
    /// Reconcile unmatched mentions against the external knowledge base
    Reconcile {
        /// Directory of linked document JSON files
        #[arg(long)]
        documents: PathBuf,

        /// Reconciliation cache file, created if absent
        #[arg(long)]
        cache: PathBuf,
    },
    /// Filter extraction noise out of linked documents
    Filter {
        /// Input document file or directory
        #[arg(long)]
        input: PathBuf,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Also drop low-confidence names without medieval patterns
        #[arg(long)]
        strict: bool,
    },
    /// Summarize a unified graph
    Stats {
        /// Unified graph JSON file
        #[arg(long)]
        graph: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    Ok(config.with_env_override()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    match cli.command {
        Commands::Link {
            authority,
            input,
            output,
        } => commands::link(&config, &authority, &input, &output),
        Commands::Merge {
            authority,
            export,
            documents,
            output,
        } => commands::merge(&authority, export.as_deref(), documents.as_deref(), &output),
        Commands::Reconcile { documents, cache } => {
            commands::reconcile(&config, &documents, &cache).await
        }
        Commands::Filter {
            input,
            output,
            strict,
        } => commands::filter(&input, &output, strict),
        Commands::Stats { graph } => commands::stats(&graph),
    }
}
