//! # Rate Limiter
//!
//! Token-bucket rate limiting for vote mutations, keyed by user id.
//!
//! ## Algorithm
//!
//! Each user owns one bucket holding up to `threshold` tokens. A vote
//! consumes one token; tokens flow back at `threshold / ttl` per second,
//! computed lazily from the elapsed time whenever the bucket is touched.
//! There are no background refill tasks.
//!
//! ## Security
//!
//! Rate limiting keeps a single account from flooding the store with
//! mutations and bounds the broadcast traffic one user can generate. Buckets
//! are shared across all of a user's concurrent connections, so opening more
//! sockets buys no extra votes.

pub mod bucket;
pub mod clock;
pub mod limiter;

pub use bucket::TokenBucket;
pub use clock::{MockTimeSource, SystemTimeSource, TimeSource};
pub use limiter::{RateLimitConfig, RateLimiter};
