//! Generic TTL/tag cache for memoizing API responses and computed summaries.
mod config;
mod core;
mod entry;
mod metrics;
pub(crate) mod policy;
mod sweeper;

pub use config::CacheConfig;
pub use self::core::GenericCache;
pub use entry::CacheEntry;
pub use metrics::CacheStats;
