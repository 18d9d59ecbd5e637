//! SmartDay CLI, the main entry point.
//!
//! Commands:
//! - `serve`:        Start the HTTP chat server
//! - `chat`:         Interactive or single-message chat
//! - `resolve-date`: Resolve a date phrase to an ISO date
//! - `config`:       Print the default configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "smartday",
    about = "SmartDay: weather-aware daily planning assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with SmartDay
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Activity preference, e.g. "실내" or "야외"
        #[arg(long)]
        preference: Option<String>,
    },

    /// Resolve a date phrase such as "내일" or "next week friday"
    ResolveDate {
        phrase: String,

        /// Base date (YYYY-MM-DD); defaults to today in the configured timezone
        #[arg(long)]
        base: Option<String>,
    },

    /// Print the default configuration, or its path with --path
    Config {
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            preference,
        } => commands::chat::run(message, preference).await?,
        Commands::ResolveDate { phrase, base } => commands::resolve_date::run(&phrase, base)?,
        Commands::Config { path } => commands::config_cmd::run(path)?,
    }

    Ok(())
}
