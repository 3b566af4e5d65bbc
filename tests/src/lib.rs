//! # Tally Test Suite
//!
//! Unified test crate for flows that span more than one tally crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Gateway + store + limiter working together
//!     └── flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p tally-tests
//!
//! # By category
//! cargo test -p tally-tests integration::
//! ```
//!
//! Per-crate unit tests live next to the code they cover; this crate holds
//! only the scenarios that need the whole stack wired up.

pub mod integration;
