//! Submit an operation through the sync engine.

use clap::Args;
use finsync_core::{OpKind, Operation};

use super::build_engine;
use crate::config::Config;

/// Submit an operation to the sync engine
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Target resource, e.g. transactions or accounts
    resource: String,

    /// JSON payload for the operation
    #[arg(long, default_value = "{}")]
    data: String,

    /// Operation kind: insert, update, delete or batch
    #[arg(long, default_value = "insert")]
    kind: String,

    /// Reuse an idempotency key instead of generating one
    #[arg(long)]
    id: Option<uuid::Uuid>,

    /// Queue immediately instead of contacting the server
    #[arg(long)]
    offline: bool,
}

impl SubmitCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let kind: OpKind = self.kind.parse()?;
        let payload: serde_json::Value = serde_json::from_str(&self.data)?;

        let mut engine = build_engine(config)?;
        if self.offline {
            engine.set_online(false).await?;
        }

        let mut operation = Operation::new(kind, &self.resource, payload);
        if let Some(id) = self.id {
            operation = operation.with_id(id);
        }
        let description = operation.describe();

        match engine.submit(operation).await {
            Ok(value) => {
                println!("✓ {} synced", description);
                if !value.is_null() {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
            }
            Err(err) if err.queued() => {
                println!(
                    "✗ {} ({} operation(s) pending)",
                    err,
                    engine.state().pending_count
                );
            }
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }
}
