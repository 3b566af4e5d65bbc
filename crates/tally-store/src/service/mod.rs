//! # Vote Store Service
//!
//! The main service implementing the vote store API.
//!
//! ## Architecture
//!
//! This service:
//! 1. Serializes mutations per entity, so concurrent votes on the same
//!    post or comment apply one at a time
//! 2. Recomputes score aggregates from live votes, never patches them
//! 3. Commits each vote mutation and its score upsert in one atomic batch

mod store;

use crate::domain::errors::VoteStoreError;
use crate::domain::keys::KeyPrefix;
use crate::domain::records::{ScoreRecord, VoteRecord};
use crate::ports::outbound::KeyValueStore;
use dashmap::DashMap;
use std::sync::Arc;
use tally_types::{EntityRef, UserId};
use tokio::sync::Mutex;

/// The Vote Store Service.
///
/// Generic over its storage port; production wires
/// [`crate::adapters::file::FileBackedKVStore`], tests wire
/// [`crate::adapters::memory::InMemoryKVStore`].
pub struct VoteStoreService<KV: KeyValueStore> {
    /// Key-value store for persistence.
    pub(crate) kv: Arc<KV>,
    /// One mutation gate per entity.
    entity_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<KV: KeyValueStore> VoteStoreService<KV> {
    pub fn new(kv: Arc<KV>) -> Self {
        Self {
            kv,
            entity_locks: DashMap::new(),
        }
    }

    /// The serialization gate for one entity.
    ///
    /// The `Arc` is cloned out of the map entry so no shard lock is held
    /// while a caller waits on the mutex.
    fn entity_lock(&self, entity: &EntityRef) -> Arc<Mutex<()>> {
        self.entity_locks
            .entry(entity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_vote(
        &self,
        user: UserId,
        entity: &EntityRef,
    ) -> Result<Option<VoteRecord>, VoteStoreError> {
        let key = KeyPrefix::vote_key(user, entity);
        match self.kv.get(&key)? {
            Some(bytes) => Ok(Some(decode_vote(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Every live vote on `entity`.
    fn live_votes(&self, entity: &EntityRef) -> Result<Vec<VoteRecord>, VoteStoreError> {
        let prefix = KeyPrefix::entity_votes_prefix(entity);
        let pairs = self.kv.prefix_scan(&prefix)?;
        let mut votes = Vec::with_capacity(pairs.len());
        for (key, bytes) in pairs {
            votes.push(decode_vote(&key, &bytes)?);
        }
        Ok(votes)
    }
}

pub(crate) fn encode<T: serde::Serialize>(record: &T) -> Result<Vec<u8>, VoteStoreError> {
    bincode::serialize(record).map_err(|e| VoteStoreError::Encoding(e.to_string()))
}

pub(crate) fn decode_vote(key: &[u8], bytes: &[u8]) -> Result<VoteRecord, VoteStoreError> {
    bincode::deserialize(bytes).map_err(|e| VoteStoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        detail: e.to_string(),
    })
}

pub(crate) fn decode_score(key: &[u8], bytes: &[u8]) -> Result<ScoreRecord, VoteStoreError> {
    bincode::deserialize(bytes).map_err(|e| VoteStoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        detail: e.to_string(),
    })
}
