use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the engine currently is in its sync lifecycle.
///
/// `Synced` is the attractor under normal operation; `Offline` is the
/// resting state while work is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Retrying,
    Synced,
    Failed,
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Retrying => "retrying",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Offline => "offline",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot of the engine's sync state, broadcast to subscribers.
///
/// `pending_count` always equals the queue's current size. Mutated only
/// by the engine; subscribers receive it read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,
    pub pending_count: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub is_online: bool,
}

impl SyncState {
    pub fn new(is_online: bool) -> Self {
        Self {
            status: SyncStatus::Idle,
            pending_count: 0,
            last_sync_time: None,
            last_error: None,
            is_online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SyncState::new(true);
        assert_eq!(state.status, SyncStatus::Idle);
        assert_eq!(state.pending_count, 0);
        assert!(state.last_sync_time.is_none());
        assert!(state.is_online);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::Syncing.to_string(), "syncing");
        assert_eq!(SyncStatus::Offline.to_string(), "offline");
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&SyncStatus::Retrying).unwrap();
        assert_eq!(json, "\"retrying\"");
    }
}
