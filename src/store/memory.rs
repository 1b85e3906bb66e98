use crate::errors::CacheError;
use crate::store::{MediumStore, quota_error, record_bytes};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    map: HashMap<String, Vec<u8>>,
    bytes: usize,
    quota: Option<usize>,
}

/// In-memory Medium store with an optional byte quota.
///
/// Clones share the same contents, so a test can keep a handle and inspect what the
/// cache wrote, or hand the same store to two caches.
#[derive(Clone, Default)]
pub struct MemoryMediumStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryMediumStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::default();
        store.set_quota(Some(quota_bytes));
        store
    }

    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        self.inner.lock().quota = quota_bytes;
    }

    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.inner.lock().bytes
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().map.keys().cloned().collect()
    }
}

impl MediumStore for MemoryMediumStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.inner.lock().map.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        let old = inner.map.get(key).map_or(0, |v| record_bytes(key, v));
        let next = inner.bytes - old + record_bytes(key, &value);
        if let Some(quota) = inner.quota
            && next > quota
        {
            return Err(quota_error(next, quota));
        }
        inner.map.insert(key.to_string(), value);
        inner.bytes = next;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock();
        match inner.map.remove(key) {
            Some(v) => {
                inner.bytes -= record_bytes(key, &v);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.inner.lock().map.len())
    }

    fn get_all(&self) -> Result<Vec<(String, Vec<u8>)>, CacheError> {
        Ok(self.inner.lock().map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn set_all(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
        let total: usize = entries.iter().map(|(k, v)| record_bytes(k, v)).sum();
        let mut inner = self.inner.lock();
        if let Some(quota) = inner.quota
            && total > quota
        {
            return Err(quota_error(total, quota));
        }
        inner.map = entries.into_iter().collect();
        inner.bytes = inner.map.iter().map(|(k, v)| record_bytes(k, v)).sum();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.bytes = 0;
        Ok(())
    }
}
