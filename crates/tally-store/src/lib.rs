// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! # Tally Store - Authoritative vote state.
//!
//! This crate owns the two durable collections of the system and every
//! mutation of them:
//!
//! - **vote records**: at most one live record per `(user, entity)`;
//! - **score aggregates**: per entity, always equal to the sum of the live
//!   vote values for that entity.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     TALLY STORE                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  ports::inbound::VoteStoreApi      (what callers use)    │
//! │        │                                                 │
//! │  service::VoteStoreService                               │
//! │    · per-entity write locks                              │
//! │    · exclusive delete / replace / insert branching       │
//! │    · score recompute = Σ live votes                      │
//! │        │                                                 │
//! │  ports::outbound::KeyValueStore    (what we require)     │
//! │        │                                                 │
//! │  adapters: InMemoryKVStore · FileBackedKVStore           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Scores are recomputed from the live records on every mutation rather than
//! incrementally patched, so the aggregate can never drift from the records.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use adapters::file::FileBackedKVStore;
pub use adapters::memory::InMemoryKVStore;
pub use domain::errors::{KVStoreError, VoteStoreError};
pub use domain::keys::KeyPrefix;
pub use domain::records::{ScoreRecord, VoteRecord};
pub use ports::inbound::VoteStoreApi;
pub use ports::outbound::{BatchOperation, KeyValueStore};
pub use service::VoteStoreService;
