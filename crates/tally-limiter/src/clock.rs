//! Time injection for the limiter.
//!
//! Refill math depends only on a millisecond counter, so tests drive it with
//! a manually advanced source instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the epoch.
    fn now_millis(&self) -> u64;
}

/// Default time source using system time.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced time source for deterministic tests.
#[derive(Default)]
pub struct MockTimeSource {
    now_ms: AtomicU64,
}

impl MockTimeSource {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Move time forward.
    pub fn advance_millis(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_millis(secs * 1000);
    }
}

impl TimeSource for MockTimeSource {
    fn now_millis(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
