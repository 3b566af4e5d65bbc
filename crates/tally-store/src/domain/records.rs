//! Persisted record shapes. Values are bincode-encoded under the keys of
//! [`crate::domain::keys::KeyPrefix`].

use serde::{Deserialize, Serialize};
use tally_types::{EntityId, EntityKind, EntityRef, UserId, VoteDirection};

/// One user's current stance on one entity. Existence of the record is what
/// "has a vote" means; absence means no vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub user: UserId,
    pub kind: EntityKind,
    pub id: EntityId,
    /// `+1` or `-1`.
    pub value: i8,
}

impl VoteRecord {
    pub fn new(user: UserId, entity: EntityRef, direction: VoteDirection) -> Self {
        Self {
            user,
            kind: entity.kind,
            id: entity.id,
            value: direction.value() as i8,
        }
    }

    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }

    pub fn direction(&self) -> VoteDirection {
        VoteDirection::from_value(i64::from(self.value))
    }
}

/// Cached sum of vote values for one entity. Derived state: rewritten from
/// the live records on every mutation, never patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub kind: EntityKind,
    pub id: EntityId,
    pub score: i64,
}

impl ScoreRecord {
    pub fn new(entity: EntityRef, score: i64) -> Self {
        Self {
            kind: entity.kind,
            id: entity.id,
            score,
        }
    }

    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }
}
