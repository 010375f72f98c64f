use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod transport;

use commands::{ErrorsCommand, QueueCommand, SubmitCommand, SyncCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "finsync")]
#[command(version)]
#[command(about = "Offline-first sync for personal finance data", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an operation to the sync engine
    Submit(SubmitCommand),

    /// Replay queued operations
    Sync(SyncCommand),

    /// Inspect or clear the offline queue
    Queue(QueueCommand),

    /// Inspect the error log
    Errors(ErrorsCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finsync=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Submit(cmd)) => cmd.run(&config).await?,
        Some(Commands::Sync(cmd)) => cmd.run(&config).await?,
        Some(Commands::Queue(cmd)) => cmd.run(&config).await?,
        Some(Commands::Errors(cmd)) => cmd.run(&config)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
