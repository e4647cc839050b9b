//! # askdocs
//!
//! Ask questions about your local documents, answered by local models
//! through Ollama.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod app;
mod commands;
mod config;

use app::App;
use config::AppConfig;

#[derive(Parser)]
#[command(name = "askdocs")]
#[command(version)]
#[command(about = "Ask questions about your local documents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the vector store and ingest state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files or directories (default: the documents directory)
    Ingest {
        paths: Vec<PathBuf>,

        /// Re-ingest files even when they have not changed
        #[arg(short, long)]
        force: bool,
    },

    /// Ingest the documents directory, then keep it in sync
    Watch {
        /// Documents directory to watch instead of the configured one
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Answer a single question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the context the answer was generated from
        #[arg(long)]
        show_context: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the context each answer was generated from
        #[arg(long)]
        show_context: bool,
    },

    /// Show what is in the vector store
    Stats,

    /// Remove documents by id or path
    Remove {
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Show the effective configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }

    if let Commands::Config { path } = cli.command {
        return commands::show_config(&config, cli.config.as_deref(), path);
    }
    if let Commands::Watch { dir: Some(dir) } = &cli.command {
        config.documents.path = dir.clone();
    }

    let app = App::open(config).await?;
    let result = match cli.command {
        Commands::Ingest { paths, force } => commands::ingest(&app, paths, force).await,
        Commands::Watch { .. } => commands::watch(&app).await,
        Commands::Ask {
            question,
            top_k,
            show_context,
        } => commands::ask(&app, &question.join(" "), top_k, show_context).await,
        Commands::Chat {
            top_k,
            show_context,
        } => commands::chat(&app, top_k, show_context).await,
        Commands::Stats => commands::stats(&app).await,
        Commands::Remove { targets } => commands::remove(&app, targets).await,
        Commands::Config { .. } => Ok(()),
    };

    app.shutdown().await?;
    result
}
