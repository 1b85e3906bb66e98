//! Time source for every TTL decision in the crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Wall-clock milliseconds. Implementations must be cheap; `now_millis` runs on every read.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        crate::utils::num::i64_to_u64_saturating_nonnegative(chrono::Utc::now().timestamp_millis())
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_millis: u64) -> Self {
        Self { now: AtomicU64::new(start_millis) }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(crate::utils::num::duration_millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `now > inserted_at + ttl`, the single expiry rule shared by every tier.
#[inline]
#[must_use]
pub fn is_expired(now: u64, inserted_at: u64, ttl: Duration) -> bool {
    now > inserted_at.saturating_add(crate::utils::num::duration_millis(ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let c = ManualClock::new(10);
        assert_eq!(c.now_millis(), 10);
        c.advance(Duration::from_millis(5));
        assert_eq!(c.now_millis(), 15);
        c.set(3);
        assert_eq!(c.now_millis(), 3);
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let ttl = Duration::from_millis(1000);
        assert!(!is_expired(1000, 0, ttl));
        assert!(is_expired(1001, 0, ttl));
        assert!(!is_expired(u64::MAX, 5, Duration::MAX));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
