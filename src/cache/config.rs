use std::time::Duration;

/// Configuration for a [`GenericCache`](super::GenericCache).
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Name used in logs and telemetry reports.
    pub name: String,
    /// Maximum number of entries; clamped to at least 1.
    pub max_size: usize,
    /// TTL callers can use when they have no better value.
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
    /// Keys examined per lock acquisition during a sweep.
    pub sweep_batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "generic".to_string(),
            max_size: 1000,
            default_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
            sweep_batch_size: 256,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size, ..Default::default() }
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.max_size = self.max_size.max(1);
        self.sweep_batch_size = self.sweep_batch_size.max(1);
        if self.sweep_interval.is_zero() {
            self.sweep_interval = Duration::from_millis(1);
        }
        self
    }
}
