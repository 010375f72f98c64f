//! Error log inspection commands.
//!
//! The error log is process-wide and in-memory; these commands surface
//! whatever the current run has captured, which makes them most useful
//! combined with `sync` in the same invocation or from an embedding
//! application.

use clap::{Args, Subcommand};

use super::build_engine;
use crate::config::Config;

/// Inspect the error log
#[derive(Debug, Args)]
pub struct ErrorsCommand {
    #[command(subcommand)]
    command: ErrorsSubcommand,
}

#[derive(Debug, Subcommand)]
enum ErrorsSubcommand {
    /// List logged errors, oldest first
    List,
    /// List only high and critical severity errors
    Critical,
    /// Print the log as JSON with state snapshots redacted
    Export,
}

impl ErrorsCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let engine = build_engine(config)?;
        let recovery = engine.recovery();

        match &self.command {
            ErrorsSubcommand::List => {
                let logs = recovery.logs();
                if logs.is_empty() {
                    println!("No errors recorded in this session.");
                    return Ok(());
                }
                for entry in logs {
                    println!(
                        "  {}  [{}] {}: {}",
                        entry
                            .timestamp
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S"),
                        entry.severity,
                        entry.context.action,
                        entry.user_message
                    );
                }
            }
            ErrorsSubcommand::Critical => {
                let logs = recovery.critical_logs();
                if logs.is_empty() {
                    println!("No critical errors recorded in this session.");
                    return Ok(());
                }
                for entry in logs {
                    println!(
                        "  {}  [{}] {}: {}",
                        entry
                            .timestamp
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S"),
                        entry.severity,
                        entry.context.action,
                        entry.user_message
                    );
                }
            }
            ErrorsSubcommand::Export => {
                println!("{}", serde_json::to_string_pretty(&recovery.export_logs())?);
            }
        }

        Ok(())
    }
}
