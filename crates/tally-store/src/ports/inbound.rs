//! # Inbound Port (Driving Port)
//!
//! The store API offered to the gateway and tests.

use crate::domain::errors::VoteStoreError;
use async_trait::async_trait;
use tally_types::{EntityRef, EntitySelection, ScoreSet, UserId, VoteAction, VoteBroadcast};

/// Vote state operations.
///
/// Implemented by [`crate::service::VoteStoreService`]; mocked at the
/// gateway boundary in tests.
#[async_trait]
pub trait VoteStoreApi: Send + Sync {
    /// Apply one vote operation and return the broadcast-ready outcome.
    ///
    /// Exactly one of three mutations happens: the existing record is
    /// deleted (retract), replaced (re-vote), or a new record inserted.
    /// Retract with no live record fails with
    /// [`VoteStoreError::NothingToRetract`] and changes nothing. The entity's
    /// score aggregate is recomputed and upserted in the same atomic batch
    /// as the vote mutation.
    async fn cast_vote(
        &self,
        user: UserId,
        entity: EntityRef,
        action: VoteAction,
    ) -> Result<VoteBroadcast, VoteStoreError>;

    /// Batched score/own-vote lookup for the requested entities.
    ///
    /// An empty selection returns an empty [`ScoreSet`] without touching
    /// storage. Entities with no score aggregate on record are omitted, not
    /// reported as zero.
    async fn get_scores(
        &self,
        selection: &EntitySelection,
        user: UserId,
    ) -> Result<ScoreSet, VoteStoreError>;
}
