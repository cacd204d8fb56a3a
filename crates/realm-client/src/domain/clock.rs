//! # Block Clock
//!
//! Observed block time never moves backwards within a session, even when a
//! lagging provider answers with an older block.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic floor over observed block timestamps (ms).
#[derive(Debug, Default)]
pub struct BlockClock {
    floor: AtomicU64,
}

impl BlockClock {
    /// Create a clock with no observations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and return the clamped block time.
    pub fn observe(&self, timestamp_ms: u64) -> u64 {
        let previous = self.floor.fetch_max(timestamp_ms, Ordering::AcqRel);
        previous.max(timestamp_ms)
    }

    /// Latest clamped time, `None` before the first observation.
    pub fn now(&self) -> Option<u64> {
        match self.floor.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        }
    }

    /// Forget all observations (new session scope).
    pub fn reset(&self) {
        self.floor.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_regresses() {
        let clock = BlockClock::new();
        assert_eq!(clock.now(), None);
        assert_eq!(clock.observe(5_000), 5_000);
        assert_eq!(clock.observe(4_000), 5_000);
        assert_eq!(clock.observe(6_000), 6_000);
        assert_eq!(clock.now(), Some(6_000));
    }

    #[test]
    fn test_reset_allows_new_floor() {
        let clock = BlockClock::new();
        clock.observe(9_000);
        clock.reset();
        assert_eq!(clock.observe(1_000), 1_000);
    }
}
