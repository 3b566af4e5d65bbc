//! # Wire Protocol
//!
//! JSON message shapes exchanged over a live connection. Every frame is an
//! `{"event": ..., "data": ...}` envelope; event names are kebab-case.
//!
//! Client-to-server traffic is [`ClientMessage`]; server-to-client traffic
//! (direct replies and broadcasts alike) is [`ServerMessage`].

use crate::entities::{
    ActorVote, AuthenticatedUser, EntityId, EntityKind, EntityRef, VoteAction, VoteDirection,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind this connection to a user identity.
    Auth { credential: String },
    /// Request current scores and own votes for a batch of entities.
    GetScores { entities: EntitySelection },
    /// Cast, change, or retract a vote.
    Vote(VoteRequest),
}

/// The batch of entities a `get-scores` request asks about, keyed by kind.
///
/// Absent kinds and unknown keys are tolerated; an empty selection is legal
/// and short-circuits to an empty reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySelection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comment: Vec<EntityId>,
}

impl EntitySelection {
    /// True when no supported kind carries any ids.
    pub fn is_empty(&self) -> bool {
        self.post.is_empty() && self.comment.is_empty()
    }

    /// The ids requested for one kind.
    pub fn ids_for(&self, kind: EntityKind) -> &[EntityId] {
        match kind {
            EntityKind::Post => &self.post,
            EntityKind::Comment => &self.comment,
        }
    }

    /// Every requested entity, posts first, in request order within a kind.
    pub fn requested(&self) -> Vec<EntityRef> {
        let mut entities = Vec::with_capacity(self.post.len() + self.comment.len());
        for kind in EntityKind::ALL {
            entities.extend(self.ids_for(kind).iter().map(|&id| EntityRef::new(kind, id)));
        }
        entities
    }
}

/// A single vote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: EntityId,
    pub direction: VoteAction,
}

impl VoteRequest {
    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Messages the server emits, as direct replies or broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Outcome of an `auth` request.
    Auth(AuthAck),
    /// Direct reply to `get-scores`.
    Scores(ScoreSet),
    /// Broadcast to every live session after a successful vote.
    VoteCast(VoteBroadcast),
    /// Private notice: the acting user just spent their last token.
    VoteLimitReached {
        #[serde(rename = "allowVotingIn")]
        allow_voting_in: u64,
    },
    /// Private notice: the vote was denied by the rate limiter.
    RateLimit { threshold: u32, ttl: u64 },
}

/// Authentication acknowledgement. Failure carries the bare `status: false`;
/// no detail about why crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthAck {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl AuthAck {
    pub fn success(user: AuthenticatedUser, version: impl Into<String>) -> Self {
        Self {
            status: true,
            user: Some(user),
            version: Some(version.into()),
        }
    }

    pub fn failure() -> Self {
        Self {
            status: false,
            user: None,
            version: None,
        }
    }
}

/// Scores and the requesting user's own votes for the queried entities.
///
/// Entities with no score aggregate on record are omitted from `scores`
/// rather than reported as zero; entities the user has not voted on are
/// omitted from `userVotes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub scores: BTreeMap<String, i64>,
    #[serde(rename = "userVotes")]
    pub user_votes: BTreeMap<String, VoteDirection>,
}

impl ScoreSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.user_votes.is_empty()
    }
}

/// The state change broadcast after one vote lands: the affected entity's new
/// score plus the acting user's new stance. Exactly one entry per map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteBroadcast {
    pub scores: BTreeMap<String, i64>,
    #[serde(rename = "userVotes")]
    pub user_votes: BTreeMap<String, ActorVote>,
}

impl VoteBroadcast {
    /// Build the single-entity payload produced by a vote.
    pub fn single(entity: EntityRef, score: i64, actor: ActorVote) -> Self {
        let key = entity.to_string();
        let mut scores = BTreeMap::new();
        scores.insert(key.clone(), score);
        let mut user_votes = BTreeMap::new();
        user_votes.insert(key, actor);
        Self { scores, user_votes }
    }

    /// The new score of the affected entity.
    pub fn score_of(&self, entity: &EntityRef) -> Option<i64> {
        self.scores.get(&entity.to_string()).copied()
    }
}
