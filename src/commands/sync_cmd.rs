//! Sync CLI commands for replaying the offline queue.

use clap::{Args, Subcommand};

use super::build_engine;
use crate::config::Config;

/// Replay queued operations
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and queue status
    Status,
}

impl SyncCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(config).await,
            Some(SyncSubcommand::Status) => self.status(config),
        }
    }

    async fn sync(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = build_engine(config)?;

        let pending = engine.state().pending_count;
        if pending == 0 {
            println!("Nothing to sync.");
            return Ok(());
        }

        println!("Replaying {} queued operation(s)...", pending);
        println!();

        let summary = engine.replay_queue().await?;

        if summary.succeeded > 0 {
            println!("  ✓ {} replayed", summary.succeeded);
        }
        if summary.dropped > 0 {
            println!("  ✗ {} dropped after exhausting retries", summary.dropped);
        }
        if summary.remaining > 0 {
            println!("  {} still pending", summary.remaining);
        }

        // Surface anything the replay pushed into the error log.
        for entry in engine.recovery().critical_logs() {
            println!("  ! {}", entry.user_message);
        }

        println!();
        if summary.remaining == 0 {
            println!("Sync complete.");
        } else {
            println!("Partial sync; run again once the connection recovers.");
        }

        Ok(())
    }

    fn status(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Configuration");
        println!("==================");
        println!();
        println!("Server:   {}", config.api_url);
        println!("Data dir: {}", config.data_dir.display());
        match &config.api_key {
            Some(key) => println!("API Key:  {}...", &key[..key.len().min(8)]),
            None => println!("API Key:  (none)"),
        }
        println!();

        let engine = build_engine(config)?;
        let state = engine.state();
        println!("Status:  {}", state.status);
        println!("Pending: {}", state.pending_count);

        Ok(())
    }
}
