//! # Outbound Port (Driven Port)
//!
//! The storage interface the vote store requires from its host.

use crate::domain::errors::KVStoreError;

/// Abstract interface for key-value database operations.
///
/// Adapters provide interior locking: the store is shared by every
/// connection task, so mutations take `&self`.
///
/// Production: [`crate::adapters::file::FileBackedKVStore`]
/// Testing: [`crate::adapters::memory::InMemoryKVStore`]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch become visible, or NONE are
    /// applied. The vote mutation and its score upsert travel through here
    /// together.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Collect every pair whose key starts with `prefix`.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } => key,
            BatchOperation::Delete { key } => key,
        }
    }
}
