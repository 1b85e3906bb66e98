use crate::telemetry::{HitRateGrade, StatsReport};

/// Counters for one cache. `hits`, `misses` and `sets` only ever grow; `size` is a gauge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub size: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0.0 before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        crate::utils::num::ratio(self.hits, self.misses)
    }

    #[must_use]
    pub fn grade(&self) -> HitRateGrade {
        HitRateGrade::from_rate(self.hit_rate())
    }

    #[must_use]
    pub fn report(&self, source: &str) -> StatsReport {
        StatsReport::new(source, self.hits, self.misses, self.sets, self.evictions, self.size)
    }
}
