use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memvault::{cli, config, server};

#[derive(Parser)]
#[command(name = "memvault", version, about = "Local semantic memory MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport by default)
    Serve {
        /// Serve streamable HTTP on server.host:server.port instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Search memories by meaning
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a memory as stored, and the current version if it was superseded
    Inspect { id: String },
    /// Soft-delete a memory
    Forget { id: String },
    /// List memories, newest first by default
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Include superseded and forgotten memories
        #[arg(long)]
        all: bool,
        /// Only memories tagged with any of these (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Oldest first
        #[arg(long)]
        oldest: bool,
    },
    /// Show memory counts
    Stats,
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.memvault/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter =
        EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Search { query, limit } => cli::search::search(&config, &query, limit).await?,
        Command::Inspect { id } => cli::inspect::inspect(&config, &id)?,
        Command::Forget { id } => cli::forget::forget(&config, &id)?,
        Command::List {
            limit,
            all,
            tags,
            oldest,
        } => cli::list::list(&config, limit, all, tags, oldest)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
