//! Three-tier promotion cache for an expensive, deterministic derivation.
//!
//! Fast is an in-process map with a short TTL, Medium a local persistent
//! [`MediumStore`](crate::store::MediumStore) with a longer TTL and batch eviction, and
//! Slow an external [`DurableStore`](crate::store::DurableStore) consulted only for
//! scoped keys. Every entry carries the schema version it was written under; any other
//! version reads as a miss.

mod config;
mod core;
mod entry;
mod fast;
mod key;
mod medium;
mod reporter;
mod slow;
mod stats;

pub use config::{DEFAULT_MEDIUM_EVICTION_FRACTION, DEFAULT_REPORT_INTERVAL, DERIVATION_SCHEMA_VERSION, TieredConfig};
pub use self::core::TieredDerivationCache;
pub use entry::{DerivationEntry, StoredEntry, Tier, TierHit, Validity};
pub use key::{DerivationKey, sha256_hex};
pub use stats::TieredStats;
