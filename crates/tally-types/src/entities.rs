//! # Core Domain Entities
//!
//! The voting vocabulary: votable entities, user identity, and vote
//! directions.
//!
//! ## Clusters
//!
//! - **Content**: `EntityKind`, `EntityId`, `EntityRef`
//! - **Identity**: `UserId`, `AuthenticatedUser`
//! - **Votes**: `VoteDirection`, `VoteAction`, `ActorVote`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: CONTENT
// =============================================================================

/// The categories of content that accept votes.
///
/// This enum is closed on purpose: a request naming any other kind fails to
/// parse at the wire boundary and never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Post,
    Comment,
}

impl EntityKind {
    /// All supported kinds, in the order queries enumerate them.
    pub const ALL: [EntityKind; 2] = [EntityKind::Post, EntityKind::Comment];

    /// The lowercase wire/storage name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityKind(pub String);

impl fmt::Display for UnknownEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEntityKind {}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(EntityKind::Post),
            "comment" => Ok(EntityKind::Comment),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// Numeric identifier of a votable entity within its kind.
pub type EntityId = u64;

/// A votable entity: `(kind, id)`.
///
/// `Display` renders the composite key used in payload maps and as the base
/// of storage keys, e.g. `post_42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}

// =============================================================================
// CLUSTER B: IDENTITY
// =============================================================================

/// Stable numeric identifier of a user, assigned by the external credential
/// validator. Rate buckets and vote records are keyed by it, so it outlives
/// any single connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An identity confirmed by the credential validator.
///
/// Only `id` is load-bearing; `name` is carried for the auth acknowledgement
/// when the validator provides it. Unknown validator fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(id: UserId) -> Self {
        Self { id, name: None }
    }

    pub fn with_name(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

// =============================================================================
// CLUSTER C: VOTES
// =============================================================================

/// The stance a live vote holds on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// The weight this stance contributes to a score: `+1` or `-1`.
    pub fn value(&self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    /// Recover a stance from a stored weight. Non-positive weights read as
    /// `Down`, matching how persisted records are interpreted.
    pub fn from_value(value: i64) -> Self {
        if value > 0 {
            VoteDirection::Up
        } else {
            VoteDirection::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a client asks to do with its vote on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Up,
    Down,
    Retract,
}

impl VoteAction {
    /// The stance this action establishes; `None` means the vote is removed.
    pub fn target(&self) -> Option<VoteDirection> {
        match self {
            VoteAction::Up => Some(VoteDirection::Up),
            VoteAction::Down => Some(VoteDirection::Down),
            VoteAction::Retract => None,
        }
    }
}

/// The acting user's new stance on one entity, as broadcast to observers.
///
/// `direction: null` communicates a retraction without revealing what the
/// previous vote was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorVote {
    pub user_id: UserId,
    pub direction: Option<VoteDirection>,
}

impl ActorVote {
    pub fn new(user_id: UserId, direction: Option<VoteDirection>) -> Self {
        Self { user_id, direction }
    }
}
