use crate::errors::CacheError;
use crate::tiered::StoredEntry;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// External durable store behind the Slow tier.
///
/// Shared between processes and queried by scope, so every call carries the scope id
/// alongside the key. Capacity and expiry are the store's own business.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str, scope_id: &str) -> Result<Option<StoredEntry>, CacheError>;

    async fn set(&self, key: &str, scope_id: &str, entry: StoredEntry) -> Result<(), CacheError>;

    async fn remove(&self, key: &str, scope_id: &str) -> Result<(), CacheError>;
}

/// In-process durable store with an availability switch and call counters.
#[derive(Clone)]
pub struct MemoryDurableStore {
    entries: Arc<RwLock<HashMap<(String, String), StoredEntry>>>,
    available: Arc<AtomicBool>,
    gets: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl Default for MemoryDurableStore {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            gets: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl MemoryDurableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every call fails with [`CacheError::SlowTierUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get_calls(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn set_calls(&self) -> u64 {
        self.sets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn entry(&self, key: &str, scope_id: &str) -> Option<StoredEntry> {
        self.entries.read().get(&(key.to_string(), scope_id.to_string())).cloned()
    }

    /// Seed an entry directly, bypassing counters.
    pub fn insert(&self, key: &str, scope_id: &str, entry: StoredEntry) {
        self.entries.write().insert((key.to_string(), scope_id.to_string()), entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::SlowTierUnavailable("memory durable store switched off".to_string()))
        }
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn get(&self, key: &str, scope_id: &str) -> Result<Option<StoredEntry>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.entry(key, scope_id))
    }

    async fn set(&self, key: &str, scope_id: &str, entry: StoredEntry) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.insert(key, scope_id, entry);
        Ok(())
    }

    async fn remove(&self, key: &str, scope_id: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.write().remove(&(key.to_string(), scope_id.to_string()));
        Ok(())
    }
}
