use crate::errors::CacheError;
use std::time::Duration;

/// Schema version compiled into this build. Bump it whenever the derivation's output
/// shape changes; entries written under any other version read as misses.
pub const DERIVATION_SCHEMA_VERSION: u32 = 1;

/// Share of the Medium tier dropped in one batch when it overflows.
pub const DEFAULT_MEDIUM_EVICTION_FRACTION: f64 = 0.10;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct TieredConfig {
    pub schema_version: u32,
    pub fast_max_entries: usize,
    pub fast_ttl: Duration,
    pub medium_max_entries: usize,
    pub medium_ttl: Duration,
    pub medium_eviction_fraction: f64,
    /// `None` leaves expiry of durable entries to the durable store.
    pub slow_ttl: Option<Duration>,
    /// How often the background reporter purges Fast and Medium and publishes stats.
    /// `None` turns the reporter off.
    pub report_interval: Option<Duration>,
}

impl Default for TieredConfig {
    fn default() -> Self {
        Self {
            schema_version: DERIVATION_SCHEMA_VERSION,
            fast_max_entries: 100,
            fast_ttl: Duration::from_secs(5 * 60),
            medium_max_entries: 1000,
            medium_ttl: Duration::from_secs(24 * 60 * 60),
            medium_eviction_fraction: DEFAULT_MEDIUM_EVICTION_FRACTION,
            slow_ttl: None,
            report_interval: Some(DEFAULT_REPORT_INTERVAL),
        }
    }
}

impl TieredConfig {
    /// # Errors
    /// Returns `CacheError::Config` for zero capacities, a fraction outside (0, 1] or a
    /// zero report interval.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.fast_max_entries == 0 {
            return Err(CacheError::Config("fast_max_entries cannot be 0".to_string()));
        }
        if self.medium_max_entries == 0 {
            return Err(CacheError::Config("medium_max_entries cannot be 0".to_string()));
        }
        let f = self.medium_eviction_fraction;
        if !(f > 0.0 && f <= 1.0) {
            return Err(CacheError::Config(format!("medium_eviction_fraction must be in (0, 1], got {f}")));
        }
        if self.report_interval.is_some_and(|d| d.is_zero()) {
            return Err(CacheError::Config("report_interval cannot be 0".to_string()));
        }
        Ok(())
    }
}
