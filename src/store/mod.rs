//! Storage collaborators behind the Medium and Slow tiers.
//!
//! The Medium tier talks to a host-provided local key-value store of bytes
//! ([`MediumStore`]); the Slow tier talks to an external durable store through the
//! async [`DurableStore`] trait. Both may fail; the tiered cache treats every failure
//! as non-fatal.

mod durable;
mod file;
mod memory;

pub use durable::{DurableStore, MemoryDurableStore};
pub use file::FileMediumStore;
pub use memory::MemoryMediumStore;

use crate::errors::CacheError;

/// Local persistent key-value store backing the Medium tier.
///
/// `put` and `set_all` may fail with [`CacheError::StorageFull`] when a quota is hit.
pub trait MediumStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
    /// Returns whether the key was present.
    fn remove(&mut self, key: &str) -> Result<bool, CacheError>;
    fn len(&self) -> Result<usize, CacheError>;
    fn get_all(&self) -> Result<Vec<(String, Vec<u8>)>, CacheError>;
    /// Replace the whole contents with `entries`.
    fn set_all(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), CacheError>;
    fn clear(&mut self) -> Result<(), CacheError>;

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

/// Bytes a record charges against a quota.
#[inline]
pub(crate) fn record_bytes(key: &str, value: &[u8]) -> usize {
    key.len() + value.len()
}

pub(crate) fn quota_error(used: usize, quota: usize) -> CacheError {
    CacheError::StorageFull { tier: "medium", detail: format!("{used} bytes would exceed quota of {quota}") }
}
