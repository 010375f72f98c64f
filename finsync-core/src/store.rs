//! Durable mirrors for the offline operation queue.
//!
//! The engine mirrors every queue mutation here immediately, so a fresh
//! process reconstructs the queue from the store alone. Stores are
//! simple key-value collections keyed by operation id; ordering is
//! re-established from timestamps at load time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::models::QueuedOperation;

/// Durable store for queued operations.
pub trait QueueStore {
    fn add(&mut self, operation: &QueuedOperation) -> Result<(), StoreError>;
    fn get_all(&self) -> Result<Vec<QueuedOperation>, StoreError>;
    fn update(&mut self, operation: &QueuedOperation) -> Result<(), StoreError>;
    fn remove(&mut self, id: Uuid) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Errors that can occur during queue store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the queue file.
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),
    /// Error decoding the persisted queue.
    #[error("failed to decode queue file {}: {}", .0.display(), .1)]
    Decode(PathBuf, #[source] serde_json::Error),
    /// Error encoding the queue for persistence.
    #[error("failed to encode queue: {0}")]
    Encode(#[source] serde_json::Error),
}

/// File-backed queue store.
///
/// The whole queue lives in one JSON file, rewritten on every mutation.
/// Queues stay small (bounded by the per-item retry budget), so a full
/// rewrite keeps the persisted representation consistent without a
/// journal.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the conventional location inside a data directory.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("sync_queue.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<QueuedOperation>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Decode(self.path.clone(), e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(self.path.clone(), e)),
        }
    }

    fn write(&self, operations: &[QueuedOperation]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }
        let bytes = serde_json::to_vec_pretty(operations).map_err(StoreError::Encode)?;
        fs::write(&self.path, bytes).map_err(|e| StoreError::Io(self.path.clone(), e))
    }
}

impl QueueStore for FileQueueStore {
    fn add(&mut self, operation: &QueuedOperation) -> Result<(), StoreError> {
        let mut operations = self.read()?;
        operations.push(operation.clone());
        self.write(&operations)
    }

    fn get_all(&self) -> Result<Vec<QueuedOperation>, StoreError> {
        self.read()
    }

    fn update(&mut self, operation: &QueuedOperation) -> Result<(), StoreError> {
        let mut operations = self.read()?;
        match operations.iter_mut().find(|op| op.id == operation.id) {
            Some(existing) => *existing = operation.clone(),
            None => operations.push(operation.clone()),
        }
        self.write(&operations)
    }

    fn remove(&mut self, id: Uuid) -> Result<(), StoreError> {
        let mut operations = self.read()?;
        operations.retain(|op| op.id != id);
        self.write(&operations)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.write(&[])
    }
}

/// In-memory queue store for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    operations: Vec<QueuedOperation>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryQueueStore {
    fn add(&mut self, operation: &QueuedOperation) -> Result<(), StoreError> {
        self.operations.push(operation.clone());
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<QueuedOperation>, StoreError> {
        Ok(self.operations.clone())
    }

    fn update(&mut self, operation: &QueuedOperation) -> Result<(), StoreError> {
        match self.operations.iter_mut().find(|op| op.id == operation.id) {
            Some(existing) => *existing = operation.clone(),
            None => self.operations.push(operation.clone()),
        }
        Ok(())
    }

    fn remove(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.operations.retain(|op| op.id != id);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.operations.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OpKind, Operation};
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (FileQueueStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileQueueStore::in_dir(temp_dir.path());
        (store, temp_dir)
    }

    fn queued(resource: &str) -> QueuedOperation {
        let op = Operation::new(OpKind::Insert, resource, json!({"n": 1}));
        QueuedOperation::from_operation(&op, 5)
    }

    #[test]
    fn test_get_all_missing_file_is_empty() {
        let (store, _temp) = test_store();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_add_creates_directory_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");
        let mut store = FileQueueStore::in_dir(&nested);

        store.add(&queued("transactions")).unwrap();

        assert!(nested.join("sync_queue.json").exists());
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_reload_reproduces_contents() {
        let (mut store, _temp) = test_store();
        let first = queued("transactions");
        let second = queued("accounts");

        store.add(&first).unwrap();
        store.add(&second).unwrap();

        // A fresh store over the same file sees the same ordered queue.
        let reloaded = FileQueueStore::new(store.path().to_path_buf());
        let operations = reloaded.get_all().unwrap();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].id, first.id);
        assert_eq!(operations[1].id, second.id);
    }

    #[test]
    fn test_update_replaces_entry() {
        let (mut store, _temp) = test_store();
        let mut entry = queued("goals");
        store.add(&entry).unwrap();

        entry.retries = 3;
        entry.last_error = Some("network error".into());
        store.update(&entry).unwrap();

        let operations = store.get_all().unwrap();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].retries, 3);
        assert_eq!(operations[0].last_error.as_deref(), Some("network error"));
    }

    #[test]
    fn test_remove_and_clear() {
        let (mut store, _temp) = test_store();
        let first = queued("a");
        let second = queued("b");
        store.add(&first).unwrap();
        store.add(&second).unwrap();

        store.remove(first.id).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);

        store.clear().unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let (mut store, _temp) = test_store();
        store.add(&queued("a")).unwrap();
        store.remove(Uuid::new_v4()).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryQueueStore::new();
        let mut entry = queued("transactions");

        store.add(&entry).unwrap();
        entry.retries = 1;
        store.update(&entry).unwrap();

        assert_eq!(store.get_all().unwrap()[0].retries, 1);
        store.remove(entry.id).unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }
}
