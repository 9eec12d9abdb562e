//! repocache CLI - keeps a local snapshot of a GitHub user's repositories.

mod commands;
mod config;
mod progress;
mod server;
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::serve::ServeOptions;
use crate::commands::status::OutputFormat;

#[derive(Parser)]
#[command(name = "repocache")]
#[command(version)]
#[command(about = "An incremental cache of a GitHub user's repository metadata")]
#[command(
    long_about = "repocache keeps a local JSON snapshot of a GitHub user's repositories. \
Each cycle fetches only what changed since the last snapshot, skips itself when the \
API rate limit is running low, and replaces the snapshot atomically."
)]
#[command(after_long_help = r#"EXAMPLES
    Serve the snapshot and refresh it every two hours:
        $ repocache serve

    Build or refresh the snapshot once:
        $ repocache sync

    Show rate limit and snapshot freshness as JSON:
        $ repocache status --output json

CONFIGURATION
    repocache reads configuration from (later entries override earlier ones):
      1. ~/.config/repocache/config.toml (or $XDG_CONFIG_HOME/repocache/config.toml)
      2. ./repocache.toml
      3. Environment variables (REPOCACHE__ prefix, e.g., REPOCACHE__SYNC__PAGE_SIZE)
      4. The plain environment variables listed below
      5. Command-line flags

    A .env file in the current directory is loaded into the environment first,
    so its entries act as environment variables (3 and 4). Variables already
    set in the environment take precedence over .env.

ENVIRONMENT VARIABLES
    GITHUB_USERNAME       User whose repositories are cached
    GITHUB_TOKEN          GitHub personal access token (optional, raises the rate limit)
    UPDATE_INTERVAL_MS    Sync interval in milliseconds (default: 7200000)
    RATE_LIMIT_BUFFER     Minimum fraction of quota to keep in reserve (default: 0.2)
    PORT                  HTTP port for `serve` (default: 3000)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the snapshot over HTTP and keep it fresh on a timer
    Serve {
        #[command(flatten)]
        options: ServeOptions,
    },
    /// Run one sync cycle and print the outcome
    Sync {
        /// Let a full refresh drop repositories missing from the remote listing
        #[arg(long)]
        allow_shrink: bool,

        /// Fail instead of fetching more than this many pages
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show rate limit status and snapshot freshness
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("repocache=info,repocache_cli=info,tower_http=info"),
    };

    // Logs go to stderr so stdout stays clean for --output json.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(Term::stderr().is_term())
        .with_writer(std::io::stderr)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { options } => {
            let engine = commands::shared::build_engine(&config, config.sync_options())?;
            commands::serve::handle_serve(engine, options, &config).await?;
        }
        Commands::Sync {
            allow_shrink,
            max_pages,
            output,
        } => {
            let mut options = config.sync_options();
            options.allow_shrink |= allow_shrink;
            if max_pages.is_some() {
                options.max_pages = max_pages;
            }
            let engine = commands::shared::build_engine(&config, options)?;
            commands::sync::handle_sync(&engine, output).await?;
        }
        Commands::Status { output } => {
            let engine = commands::shared::build_engine(&config, config.sync_options())?;
            commands::status::handle_status(&engine, output).await?;
        }
    }

    Ok(())
}
