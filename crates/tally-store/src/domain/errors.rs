//! Error types for the store and its storage port.

use tally_types::{EntityRef, UserId};

/// Failure inside a key-value adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KVStoreError {
    /// Underlying I/O failed.
    #[error("kv store I/O error: {message}")]
    Io { message: String },

    /// On-disk data could not be interpreted.
    #[error("kv store corruption: {message}")]
    Corrupt { message: String },

    /// A journal frame or record outgrew its u32 length prefix.
    #[error("kv store frame of {bytes} bytes exceeds the u32 length prefix")]
    FrameTooLarge { bytes: usize },
}

impl KVStoreError {
    pub fn io(err: &std::io::Error) -> Self {
        KVStoreError::Io {
            message: err.to_string(),
        }
    }
}

/// Failure of a store operation, as seen by callers of the inbound port.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VoteStoreError {
    /// Retract requested but the user holds no live vote on the entity.
    /// Nothing was mutated and nothing may be broadcast.
    #[error("no live vote to retract for user {user} on {entity}")]
    NothingToRetract { user: UserId, entity: EntityRef },

    /// The storage adapter failed mid-operation. No partial mutation is
    /// visible to callers.
    #[error("storage failure: {0}")]
    Storage(#[from] KVStoreError),

    /// A persisted record failed to decode.
    #[error("corrupt record at {key}: {detail}")]
    Corrupt { key: String, detail: String },

    /// A record failed to encode before writing.
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

impl VoteStoreError {
    /// True for the retract-without-vote rejection, which is a no-op rather
    /// than a storage problem.
    pub fn is_no_op(&self) -> bool {
        matches!(self, VoteStoreError::NothingToRetract { .. })
    }
}
