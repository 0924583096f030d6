//! CodeContext CLI - hybrid code search
//!
//! # Usage
//!
//! ```bash
//! # Index the current directory
//! codecontext index
//!
//! # Re-index only what changed
//! codecontext index --incremental
//!
//! # Search
//! codecontext search "order processing flow" --limit 5
//!
//! # Manage projects
//! codecontext list-projects
//! codecontext status --project shop
//! codecontext delete-project shop --yes
//! ```
//!
//! Exit codes: 0 success (including empty results), 1 user error,
//! 2 store/embedder/indexing failure.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use codecontext_search::SearchError;

mod commands;
mod progress;

/// CodeContext - hybrid code search over an indexed repository
#[derive(Parser, Debug)]
#[command(name = "codecontext")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Project name (default: detected from git remote or directory)
    #[arg(long, short = 'p', global = true, env = "CODECONTEXT_PROJECT")]
    project: Option<String>,

    /// Vector store URL
    #[arg(long, global = true, env = "CODECONTEXT_STORE_URL")]
    store_url: Option<String>,

    /// Embedding provider (openai, hash)
    #[arg(long, global = true, env = "CODECONTEXT_EMBEDDING_PROVIDER", value_parser = parse_provider)]
    embedding_provider: Option<codecontext_config::EmbeddingProviderKind>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

fn parse_provider(s: &str) -> Result<codecontext_config::EmbeddingProviderKind, String> {
    s.parse()
        .map_err(|e: codecontext_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    fn to_config_overrides(&self) -> codecontext_config::ConfigOverrides {
        codecontext_config::ConfigOverrides {
            store_url: self.store_url.clone(),
            embedding_provider: self.embedding_provider,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a project directory
    Index(commands::index::IndexArgs),

    /// Search an indexed project
    Search(commands::search::SearchArgs),

    /// List indexed projects
    ListProjects,

    /// Delete a project's index
    DeleteProject(commands::projects::DeleteArgs),

    /// Show index status
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: tracing subscriber already installed");
    }

    let result = match cli.command {
        Commands::Index(args) => commands::index::execute(args, &cli.global).await,
        Commands::Search(args) => commands::search::execute(args, &cli.global).await,
        Commands::ListProjects => commands::projects::list(&cli.global).await,
        Commands::DeleteProject(args) => commands::projects::delete(args, &cli.global).await,
        Commands::Status(args) => commands::status::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => {}
        Err(error) => {
            eprintln!("error[{}]: {}", error.kind(), error);
            if let Some(remedy) = remediation(&error) {
                eprintln!("hint: {}", remedy);
            }
            std::process::exit(error.exit_code());
        }
    }
}

/// One-line remediation per error kind, where one exists.
fn remediation(error: &SearchError) -> Option<&'static str> {
    match error {
        SearchError::EmptyQuery => Some("pass a non-empty query string"),
        SearchError::ProjectNotFound { .. } => {
            Some("run `codecontext list-projects` to see what is indexed")
        }
        SearchError::Storage(_) => Some("check that the vector store is reachable (storage.url)"),
        SearchError::Embedding(_) => {
            Some("check the embedding provider settings under [embedding]")
        }
        SearchError::Configuration(_) => Some("validate .codecontext.toml against the docs"),
        _ => None,
    }
}

/// `PathBuf` positional default: the current directory.
fn default_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
