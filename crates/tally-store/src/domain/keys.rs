//! Key schema for the two logical collections.
//!
//! One key-value namespace holds both collections, separated by prefix:
//!
//! ```text
//! vote:{kind}:{id}:{userId}   -> VoteRecord
//! score:{kind}:{id}           -> ScoreRecord
//! ```
//!
//! Vote keys end the entity portion with a separator, so a prefix scan for
//! `vote:post:4:` can never pick up records of `post 42`.

use tally_types::{EntityRef, UserId};

/// Key construction for database operations.
pub struct KeyPrefix;

impl KeyPrefix {
    pub const VOTE: &'static str = "vote:";
    pub const SCORE: &'static str = "score:";

    /// Key of one user's vote record on one entity.
    pub fn vote_key(user: UserId, entity: &EntityRef) -> Vec<u8> {
        format!("{}{}:{}:{}", Self::VOTE, entity.kind, entity.id, user).into_bytes()
    }

    /// Prefix covering every vote record of one entity.
    pub fn entity_votes_prefix(entity: &EntityRef) -> Vec<u8> {
        format!("{}{}:{}:", Self::VOTE, entity.kind, entity.id).into_bytes()
    }

    /// Key of one entity's score aggregate.
    pub fn score_key(entity: &EntityRef) -> Vec<u8> {
        format!("{}{}:{}", Self::SCORE, entity.kind, entity.id).into_bytes()
    }
}
