use crate::telemetry::StatsReport;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the tiers and the slow writer task.
#[derive(Debug, Default)]
pub(crate) struct TieredMetrics {
    pub fast_hits: AtomicU64,
    pub medium_hits: AtomicU64,
    pub slow_hits: AtomicU64,
    pub misses: AtomicU64,
    pub promotions: AtomicU64,
    pub sets: AtomicU64,
    pub fast_evictions: AtomicU64,
    pub medium_evictions: AtomicU64,
    pub stale_versions: AtomicU64,
    pub medium_write_failures: AtomicU64,
    pub slow_errors: AtomicU64,
}

#[inline]
pub(crate) fn bump(c: &AtomicU64) {
    c.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn add(c: &AtomicU64, n: u64) {
    c.fetch_add(n, Ordering::Relaxed);
}

impl TieredMetrics {
    pub(crate) fn snapshot(&self, fast_size: u64, medium_size: u64) -> TieredStats {
        let ld = |c: &AtomicU64| c.load(Ordering::Relaxed);
        TieredStats {
            fast_hits: ld(&self.fast_hits),
            medium_hits: ld(&self.medium_hits),
            slow_hits: ld(&self.slow_hits),
            misses: ld(&self.misses),
            promotions: ld(&self.promotions),
            sets: ld(&self.sets),
            fast_evictions: ld(&self.fast_evictions),
            medium_evictions: ld(&self.medium_evictions),
            stale_versions: ld(&self.stale_versions),
            medium_write_failures: ld(&self.medium_write_failures),
            slow_errors: ld(&self.slow_errors),
            fast_size,
            medium_size,
        }
    }
}

/// Snapshot of a [`TieredDerivationCache`](super::TieredDerivationCache)'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TieredStats {
    pub fast_hits: u64,
    pub medium_hits: u64,
    pub slow_hits: u64,
    /// Lookups that missed every tier consulted.
    pub misses: u64,
    /// Copies written into a faster tier after a Medium or Slow hit.
    pub promotions: u64,
    pub sets: u64,
    pub fast_evictions: u64,
    pub medium_evictions: u64,
    /// Entries dropped because they carried another schema version.
    pub stale_versions: u64,
    pub medium_write_failures: u64,
    pub slow_errors: u64,
    pub fast_size: u64,
    pub medium_size: u64,
}

impl TieredStats {
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.fast_hits + self.medium_hits + self.slow_hits
    }

    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        crate::utils::num::ratio(self.hits(), self.misses)
    }

    /// Aggregate report; `size` counts the Fast and Medium tiers together.
    #[must_use]
    pub fn report(&self, source: &str) -> StatsReport {
        StatsReport::new(
            source,
            self.hits(),
            self.misses,
            self.sets,
            self.fast_evictions + self.medium_evictions,
            self.fast_size + self.medium_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::HitRateGrade;

    #[test]
    fn report_aggregates_tiers() {
        let m = TieredMetrics::default();
        for _ in 0..7 {
            bump(&m.fast_hits);
        }
        bump(&m.medium_hits);
        bump(&m.slow_hits);
        bump(&m.misses);
        add(&m.fast_evictions, 2);
        add(&m.medium_evictions, 3);
        let s = m.snapshot(4, 6);
        assert_eq!(s.hits(), 9);
        let r = s.report("derivations");
        assert_eq!(r.hits, 9);
        assert_eq!(r.evictions, 5);
        assert_eq!(r.size, 10);
        assert!((r.hit_rate - 0.9).abs() < 1e-9);
        assert_eq!(r.grade, HitRateGrade::Good);
    }
}
