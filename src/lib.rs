//! Caching engine for memoized API responses and expensive derivations.
//!
//! - [`GenericCache`]: bounded key/value store with per-entry TTL, tag invalidation,
//!   insertion-order eviction and a background sweeper.
//! - [`TieredDerivationCache`]: Fast -> Medium -> Slow promotion cache for one
//!   deterministic derivation, with schema-versioned entries.
//!
//! Both are fail-open: capacity and tier availability problems are logged and turn into
//! misses, never errors.

pub mod cache;
pub mod cli;
pub mod errors;
pub mod logger;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod tiered;
pub mod utils;

pub use cache::{CacheConfig, CacheEntry, CacheStats, GenericCache};
pub use errors::CacheError;
pub use store::{DurableStore, FileMediumStore, MediumStore, MemoryDurableStore, MemoryMediumStore};
pub use telemetry::{HitRateGrade, LogSink, MemorySink, StatsReport, TelemetrySink};
pub use tiered::{DERIVATION_SCHEMA_VERSION, Tier, TierHit, TieredConfig, TieredDerivationCache, TieredStats};
pub use utils::clock::{Clock, ManualClock, SystemClock};

/// Initializes logging from `TIERCACHE_*` environment variables.
///
/// # Errors
/// Returns an error if the log directory or appenders cannot be created, or a logger is
/// already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logger::configure_from_env()
}
