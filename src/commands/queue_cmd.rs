//! Offline queue inspection commands.

use clap::{Args, Subcommand};

use super::build_engine;
use crate::config::Config;

/// Inspect or clear the offline queue
#[derive(Debug, Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    command: QueueSubcommand,
}

#[derive(Debug, Subcommand)]
enum QueueSubcommand {
    /// List queued operations in replay order
    List,
    /// Drop every queued operation
    Clear,
}

impl QueueCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = build_engine(config)?;

        match &self.command {
            QueueSubcommand::List => {
                let queued = engine.queued_operations();
                if queued.is_empty() {
                    println!("Queue is empty.");
                    return Ok(());
                }

                println!("{} queued operation(s):", queued.len());
                println!();
                for op in queued {
                    print!(
                        "  {}  {} {}  retries {}/{}",
                        op.timestamp
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S"),
                        op.kind,
                        op.resource,
                        op.retries,
                        op.max_retries
                    );
                    if let Some(last_error) = &op.last_error {
                        print!("  last error: {}", last_error);
                    }
                    println!();
                }
            }
            QueueSubcommand::Clear => {
                let count = engine.queued_operations().len();
                engine.clear_queue()?;
                println!("Queue cleared ({} operation(s) dropped).", count);
            }
        }

        Ok(())
    }
}
