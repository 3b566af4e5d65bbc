//! # Vote Store API Implementation
//!
//! Implements the `VoteStoreApi` trait for vote mutations and score queries.

use super::*;
use crate::ports::inbound::VoteStoreApi;
use crate::ports::outbound::BatchOperation;
use async_trait::async_trait;
use tally_types::protocol::{EntitySelection, ScoreSet, VoteBroadcast};
use tally_types::{ActorVote, VoteAction};

#[async_trait]
impl<KV: KeyValueStore> VoteStoreApi for VoteStoreService<KV> {
    async fn cast_vote(
        &self,
        user: UserId,
        entity: EntityRef,
        action: VoteAction,
    ) -> Result<VoteBroadcast, VoteStoreError> {
        let gate = self.entity_lock(&entity);
        let _serialized = gate.lock().await;

        let existing = self.load_vote(user, &entity)?;
        let vote_key = KeyPrefix::vote_key(user, &entity);

        // The three mutation shapes. A change of stance rewrites the record
        // under the same key; it never accumulates a second one.
        let vote_op = match (existing.as_ref(), action.target()) {
            (None, None) => {
                return Err(VoteStoreError::NothingToRetract { user, entity });
            }
            (Some(_), None) => BatchOperation::delete(vote_key),
            (_, Some(direction)) => {
                let record = VoteRecord::new(user, entity, direction);
                BatchOperation::put(vote_key, encode(&record)?)
            }
        };

        // Recompute the aggregate from live votes with this user's stance
        // substituted. The stored number is derived state, never patched.
        let mut score: i64 = self
            .live_votes(&entity)?
            .iter()
            .filter(|record| record.user != user)
            .map(|record| i64::from(record.value))
            .sum();
        if let Some(direction) = action.target() {
            score += direction.value();
        }

        let score_record = ScoreRecord::new(entity, score);
        let operations = vec![
            vote_op,
            BatchOperation::put(KeyPrefix::score_key(&entity), encode(&score_record)?),
        ];
        self.kv.atomic_batch_write(operations)?;

        tracing::debug!(
            "[store] user {} now {} on {}, score {}",
            user,
            action
                .target()
                .map(|d| d.as_str())
                .unwrap_or("retracted"),
            entity,
            score
        );

        Ok(VoteBroadcast::single(
            entity,
            score,
            ActorVote::new(user, action.target()),
        ))
    }

    async fn get_scores(
        &self,
        selection: &EntitySelection,
        user: UserId,
    ) -> Result<ScoreSet, VoteStoreError> {
        if selection.is_empty() {
            return Ok(ScoreSet::empty());
        }

        let mut set = ScoreSet::empty();
        for entity in selection.requested() {
            let map_key = entity.to_string();

            let score_key = KeyPrefix::score_key(&entity);
            if let Some(bytes) = self.kv.get(&score_key)? {
                let record = decode_score(&score_key, &bytes)?;
                set.scores.insert(map_key.clone(), record.score);
            }

            let vote_key = KeyPrefix::vote_key(user, &entity);
            if let Some(bytes) = self.kv.get(&vote_key)? {
                let record = decode_vote(&vote_key, &bytes)?;
                set.user_votes.insert(map_key, record.direction());
            }
        }

        Ok(set)
    }
}
