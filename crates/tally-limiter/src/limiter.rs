//! Per-user limiter: a concurrent table of token buckets behind atomic
//! consume semantics.

use crate::bucket::TokenBucket;
use crate::clock::{SystemTimeSource, TimeSource};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_types::UserId;
use tracing::debug;

/// Limiter configuration: `threshold` tokens per bucket, fully replenished
/// over `ttl` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity in tokens.
    pub threshold: u32,
    /// Seconds for an empty bucket to refill completely.
    pub ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            ttl_secs: 50,
        }
    }
}

impl RateLimitConfig {
    pub fn ttl_millis(&self) -> f64 {
        (self.ttl_secs * 1000) as f64
    }
}

/// Token-bucket rate limiter keyed by user id.
///
/// Buckets are created full on a user's first vote attempt and retained for
/// the process lifetime; the population is bounded by distinct users seen.
/// A bucket is shared across all of its user's concurrent connections.
pub struct RateLimiter {
    config: RateLimitConfig,
    time: Arc<dyn TimeSource>,
    buckets: DashMap<UserId, TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, time: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            time,
            buckets: DashMap::new(),
        }
    }

    pub fn with_system_time(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(SystemTimeSource))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Atomically refill and take one token for `user`.
    ///
    /// The check and the decrement happen under a single map-entry guard, so
    /// concurrent calls for the same user can never both spend the last
    /// token.
    pub fn try_consume(&self, user: UserId) -> bool {
        let now_ms = self.time.now_millis();
        let mut entry = self
            .buckets
            .entry(user)
            .or_insert_with(|| TokenBucket::full(&self.config, now_ms));
        let bucket = entry.value_mut();
        bucket.refill(now_ms, &self.config);
        let allowed = bucket.try_consume();
        if !allowed {
            debug!(user = %user, tokens = bucket.tokens, "vote denied by rate limiter");
        }
        allowed
    }

    /// Whether `user` currently has a full token, without consuming or
    /// otherwise mutating the bucket.
    pub fn has_token(&self, user: UserId) -> bool {
        match self.buckets.get(&user) {
            Some(bucket) => {
                bucket.projected_tokens(self.time.now_millis(), &self.config) >= 1.0
            }
            // Never seen: the bucket would be created full.
            None => self.config.threshold >= 1,
        }
    }

    /// Seconds until `user` next holds a full token, rounded up; zero when
    /// one is available right now.
    pub fn seconds_until_token(&self, user: UserId) -> u64 {
        match self.buckets.get(&user) {
            Some(bucket) => {
                let now_ms = self.time.now_millis();
                let mut projected = bucket.clone();
                projected.refill(now_ms, &self.config);
                projected.seconds_until_token(&self.config)
            }
            None => 0,
        }
    }

    /// Number of users with a bucket.
    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockTimeSource;

    fn limiter(threshold: u32, ttl_secs: u64) -> (RateLimiter, Arc<MockTimeSource>) {
        let clock = Arc::new(MockTimeSource::new(0));
        let limiter = RateLimiter::new(
            RateLimitConfig { threshold, ttl_secs },
            clock.clone() as Arc<dyn TimeSource>,
        );
        (limiter, clock)
    }

    #[test]
    fn second_consume_within_ttl_is_denied_then_allowed_after() {
        let (limiter, clock) = limiter(1, 5);
        let user = UserId(1);

        assert!(limiter.try_consume(user));
        assert!(!limiter.try_consume(user));

        clock.advance_millis(4_900);
        assert!(!limiter.try_consume(user));

        clock.advance_millis(100);
        assert!(limiter.try_consume(user));
    }

    #[test]
    fn buckets_are_independent_per_user() {
        let (limiter, _clock) = limiter(1, 5);
        assert!(limiter.try_consume(UserId(1)));
        assert!(limiter.try_consume(UserId(2)));
        assert!(!limiter.try_consume(UserId(1)));
        assert_eq!(limiter.tracked_users(), 2);
    }

    #[test]
    fn has_token_does_not_mutate() {
        let (limiter, _clock) = limiter(2, 10);
        let user = UserId(7);

        assert!(limiter.has_token(user));
        assert!(limiter.has_token(user));
        assert!(limiter.try_consume(user));
        assert!(limiter.try_consume(user));
        assert!(!limiter.has_token(user));
        assert!(!limiter.has_token(user));
        assert!(!limiter.try_consume(user));
    }

    #[test]
    fn seconds_until_token_reports_the_wait() {
        let (limiter, clock) = limiter(10, 50);
        let user = UserId(3);
        assert_eq!(limiter.seconds_until_token(user), 0);

        for _ in 0..10 {
            assert!(limiter.try_consume(user));
        }
        assert_eq!(limiter.seconds_until_token(user), 5);

        clock.advance_secs(2);
        assert_eq!(limiter.seconds_until_token(user), 3);

        clock.advance_secs(3);
        assert_eq!(limiter.seconds_until_token(user), 0);
        assert!(limiter.has_token(user));
    }

    #[test]
    fn concurrent_consumes_never_overspend() {
        let (limiter, _clock) = limiter(10, 3_600);
        let limiter = Arc::new(limiter);
        let user = UserId(99);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                let mut granted = 0u32;
                for _ in 0..25 {
                    if limiter.try_consume(user) {
                        granted += 1;
                    }
                }
                granted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn config_defaults_match_deployment_values() {
        let config = RateLimitConfig::default();
        assert_eq!(config.threshold, 10);
        assert_eq!(config.ttl_secs, 50);
    }
}
