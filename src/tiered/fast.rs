use crate::cache::policy::oldest_key;
use crate::tiered::entry::{DerivationEntry, Validity};
use lru::LruCache;
use parking_lot::Mutex;
use std::time::Duration;

/// In-process tier: entry-count cap, oldest insertion evicted first.
pub(crate) struct FastTier<T> {
    entries: Mutex<LruCache<String, DerivationEntry<T>>>,
    max_entries: usize,
    ttl: Duration,
}

/// Result of a Fast tier read.
pub(crate) enum FastRead<T> {
    Hit(T),
    Miss,
    /// Entry was present but expired or stale; it has been removed.
    Dropped(Validity),
}

impl<T: Clone> FastTier<T> {
    pub(crate) fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { entries: Mutex::new(LruCache::unbounded()), max_entries, ttl }
    }

    /// Check and expire under one guard.
    pub(crate) fn read(&self, key: &str, now: u64, version: u32) -> FastRead<T> {
        let mut map = self.entries.lock();
        let validity = match map.peek(key) {
            None => return FastRead::Miss,
            Some(e) => e.validity(now, Some(self.ttl), version),
        };
        if validity.is_fresh() {
            return map.peek(key).map_or(FastRead::Miss, |e| FastRead::Hit(e.result.clone()));
        }
        map.pop(key);
        FastRead::Dropped(validity)
    }

    /// Insert or overwrite. Returns the evicted key when a new key hit the cap.
    pub(crate) fn insert(&self, key: &str, entry: DerivationEntry<T>) -> Option<String> {
        self.insert_if(key, entry, || true).flatten()
    }

    /// Like [`insert`](Self::insert), but only when `admit` holds. `admit` runs under
    /// the tier guard; `None` means the entry was not admitted.
    pub(crate) fn insert_if(
        &self,
        key: &str,
        entry: DerivationEntry<T>,
        admit: impl FnOnce() -> bool,
    ) -> Option<Option<String>> {
        let mut map = self.entries.lock();
        if !admit() {
            return None;
        }
        let mut victim = None;
        if !map.contains(key) && map.len() >= self.max_entries {
            victim = oldest_key(map.iter(), |e| e.inserted_at);
            if let Some(v) = &victim {
                map.pop(v);
            }
        }
        map.put(key.to_string(), entry);
        Some(victim)
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired or stale entry. Returns the number removed.
    pub(crate) fn purge(&self, now: u64, version: u32) -> usize {
        let mut map = self.entries.lock();
        let dead: Vec<String> = map
            .iter()
            .filter(|(_, e)| !e.validity(now, Some(self.ttl), version).is_fresh())
            .map(|(k, _)| k.clone())
            .collect();
        for k in &dead {
            map.pop(k);
        }
        dead.len()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: u32, at: u64, version: u32) -> DerivationEntry<u32> {
        DerivationEntry { result: v, inserted_at: at, schema_version: version, scope_id: None, source_hash: String::new() }
    }

    #[test]
    fn evicts_oldest_insert_not_least_recently_read() {
        let t = FastTier::new(2, Duration::from_secs(60));
        t.insert("a", entry(1, 0, 1));
        t.insert("b", entry(2, 1, 1));
        assert!(matches!(t.read("a", 2, 1), FastRead::Hit(1)));
        assert_eq!(t.insert("c", entry(3, 2, 1)).as_deref(), Some("a"));
        assert!(!t.contains("a"));
        assert_eq!(t.len(), 2);
        // overwrite at cap does not evict
        assert_eq!(t.insert("c", entry(4, 3, 1)), None);
    }

    #[test]
    fn refused_insert_leaves_tier_untouched() {
        let t = FastTier::new(1, Duration::from_secs(60));
        t.insert("a", entry(1, 0, 1));
        assert_eq!(t.insert_if("b", entry(2, 1, 1), || false), None);
        assert!(t.contains("a"));
        assert!(!t.contains("b"));
        assert_eq!(t.insert_if("b", entry(2, 1, 1), || true), Some(Some("a".to_string())));
    }

    #[test]
    fn stale_and_expired_entries_are_dropped_on_read() {
        let t = FastTier::new(4, Duration::from_millis(10));
        t.insert("old", entry(1, 0, 1));
        t.insert("v0", entry(2, 0, 0));
        assert!(matches!(t.read("old", 11, 1), FastRead::Dropped(Validity::Expired)));
        assert!(matches!(t.read("v0", 1, 1), FastRead::Dropped(Validity::StaleVersion)));
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn purge_removes_only_invalid() {
        let t = FastTier::new(4, Duration::from_millis(10));
        t.insert("a", entry(1, 0, 1));
        t.insert("b", entry(2, 5, 1));
        t.insert("c", entry(3, 5, 2));
        assert_eq!(t.purge(12, 1), 2);
        assert!(t.contains("b"));
    }
}
