//! The token bucket itself: a float token count plus the last refill
//! timestamp. All methods are pure state transitions; the owning limiter
//! supplies time and configuration.

use crate::limiter::RateLimitConfig;

/// One user's bucket.
///
/// `tokens` is fractional on purpose: refill is proportional to elapsed
/// time, and a user becomes eligible again exactly when the count crosses
/// 1.0, not at some window boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    pub tokens: f64,
    pub last_refill_ms: u64,
}

impl TokenBucket {
    /// A bucket created on first sight of a user starts full.
    pub fn full(config: &RateLimitConfig, now_ms: u64) -> Self {
        Self {
            tokens: f64::from(config.threshold),
            last_refill_ms: now_ms,
        }
    }

    /// Credit tokens for the time elapsed since the last refill, capped at
    /// the configured threshold.
    pub fn refill(&mut self, now_ms: u64, config: &RateLimitConfig) {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill_ms);
        if elapsed_ms == 0 {
            return;
        }
        self.tokens = self
            .projected_tokens(now_ms, config)
            .min(f64::from(config.threshold));
        self.last_refill_ms = now_ms;
    }

    /// The token count this bucket would hold at `now_ms`, without mutating.
    pub fn projected_tokens(&self, now_ms: u64, config: &RateLimitConfig) -> f64 {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill_ms);
        let refilled =
            self.tokens + elapsed_ms as f64 * f64::from(config.threshold) / config.ttl_millis();
        refilled.min(f64::from(config.threshold))
    }

    /// Take one token if at least one is available.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn has_token(&self) -> bool {
        self.tokens >= 1.0
    }

    /// Seconds until this bucket next holds a full token, rounded up.
    /// Zero when one is already available.
    pub fn seconds_until_token(&self, config: &RateLimitConfig) -> u64 {
        if self.has_token() {
            return 0;
        }
        let deficit = 1.0 - self.tokens;
        let seconds = deficit * config.ttl_secs as f64 / f64::from(config.threshold);
        seconds.ceil() as u64
    }
}
