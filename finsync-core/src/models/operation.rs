use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The kind of mutation an operation performs against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
    Batch,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
            OpKind::Batch => "batch",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" => Ok(OpKind::Insert),
            "update" => Ok(OpKind::Update),
            "delete" => Ok(OpKind::Delete),
            "batch" => Ok(OpKind::Batch),
            other => Err(format!("unknown operation kind: {}", other)),
        }
    }
}

/// A mutating operation submitted to the sync engine.
///
/// The engine never looks inside `payload`; only the resource name and
/// the kind matter for routing. The `id` doubles as the idempotency key
/// consumers use to deduplicate at-least-once replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub kind: OpKind,
    pub resource: String,
    pub payload: Value,
}

impl Operation {
    pub fn new(kind: OpKind, resource: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            resource: resource.into(),
            payload,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Action label used in user-facing messages, e.g. "insert transactions".
    pub fn describe(&self) -> String {
        format!("{} {}", self.kind, self.resource)
    }
}

/// An operation captured while it could not be completed, awaiting replay.
///
/// Owned exclusively by the engine's queue and mirrored to the durable
/// store on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: Uuid,
    pub kind: OpKind,
    pub resource: String,
    pub payload: Value,
    /// Enqueue time; replay order is ascending by this field.
    pub timestamp: DateTime<Utc>,
    /// Failed replay attempts so far.
    pub retries: u32,
    /// Replay budget; the entry is dropped once `retries` exceeds it.
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub last_retry_time: Option<DateTime<Utc>>,
}

impl QueuedOperation {
    pub fn from_operation(operation: &Operation, max_retries: u32) -> Self {
        Self {
            id: operation.id,
            kind: operation.kind,
            resource: operation.resource.clone(),
            payload: operation.payload.clone(),
            timestamp: Utc::now(),
            retries: 0,
            max_retries,
            last_error: None,
            last_retry_time: None,
        }
    }

    /// Reconstructs the operation for a replay attempt.
    pub fn operation(&self) -> Operation {
        Operation {
            id: self.id,
            kind: self.kind,
            resource: self.resource.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Whether the replay budget is spent.
    pub fn exhausted(&self) -> bool {
        self.retries > self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_new() {
        let op = Operation::new(OpKind::Insert, "transactions", json!({"amount": 100}));
        assert_eq!(op.kind, OpKind::Insert);
        assert_eq!(op.resource, "transactions");
        assert_eq!(op.payload["amount"], 100);
    }

    #[test]
    fn test_operation_describe() {
        let op = Operation::new(OpKind::Update, "accounts", json!({}));
        assert_eq!(op.describe(), "update accounts");
    }

    #[test]
    fn test_op_kind_parse() {
        assert_eq!("insert".parse::<OpKind>().unwrap(), OpKind::Insert);
        assert_eq!("DELETE".parse::<OpKind>().unwrap(), OpKind::Delete);
        assert!("upsert".parse::<OpKind>().is_err());
    }

    #[test]
    fn test_queued_operation_from_operation() {
        let op = Operation::new(OpKind::Delete, "goals", json!({"id": "g1"}));
        let queued = QueuedOperation::from_operation(&op, 5);

        assert_eq!(queued.id, op.id);
        assert_eq!(queued.retries, 0);
        assert_eq!(queued.max_retries, 5);
        assert!(queued.last_error.is_none());
        assert!(!queued.exhausted());
    }

    #[test]
    fn test_queued_operation_roundtrip() {
        let op = Operation::new(OpKind::Batch, "budgets", json!([{"month": "2025-01"}]));
        let queued = QueuedOperation::from_operation(&op, 3);

        let json = serde_json::to_string(&queued).unwrap();
        let parsed: QueuedOperation = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, queued.id);
        assert_eq!(parsed.kind, OpKind::Batch);
        assert_eq!(parsed.timestamp, queued.timestamp);
        assert_eq!(parsed.operation().describe(), "batch budgets");
    }

    #[test]
    fn test_exhausted_after_budget() {
        let op = Operation::new(OpKind::Insert, "transactions", json!({}));
        let mut queued = QueuedOperation::from_operation(&op, 2);

        queued.retries = 2;
        assert!(!queued.exhausted());
        queued.retries = 3;
        assert!(queued.exhausted());
    }
}
