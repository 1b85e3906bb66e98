use crate::errors::CacheError;
use crate::store::MediumStore;
use crate::tiered::entry::{StoredEntry, Validity};
use crate::utils::num::batch_count;
use parking_lot::Mutex;
use std::time::Duration;

/// Local persistent tier. Holds its store behind one mutex for every
/// check-expire-return and evict-insert sequence.
pub(crate) struct MediumTier {
    store: Mutex<Box<dyn MediumStore>>,
    max_entries: usize,
    ttl: Duration,
    eviction_fraction: f64,
}

pub(crate) enum MediumRead {
    Hit(StoredEntry),
    Miss,
    Dropped(Validity),
}

/// What a Medium write did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MediumWrite {
    pub evicted: usize,
    pub stored: bool,
}

impl MediumTier {
    pub(crate) fn new(store: Box<dyn MediumStore>, max_entries: usize, ttl: Duration, eviction_fraction: f64) -> Self {
        Self { store: Mutex::new(store), max_entries, ttl, eviction_fraction }
    }

    /// Read and validate `key`. Expired, stale or unreadable records are removed.
    pub(crate) fn read(&self, key: &str, now: u64, version: u32) -> MediumRead {
        let mut store = self.store.lock();
        let bytes = match store.get(key) {
            Ok(Some(b)) => b,
            Ok(None) => return MediumRead::Miss,
            Err(e) => {
                log::warn!("medium tier: read of {key} failed: {e}");
                return MediumRead::Miss;
            }
        };
        let entry = match StoredEntry::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("medium tier: dropping unreadable record {key}: {e}");
                drop_quietly(&mut **store, key);
                return MediumRead::Miss;
            }
        };
        let validity = entry.validity(now, Some(self.ttl), version);
        if validity.is_fresh() {
            return MediumRead::Hit(entry);
        }
        drop_quietly(&mut **store, key);
        MediumRead::Dropped(validity)
    }

    /// Best-effort write. A new key at the cap triggers a batch eviction first; a
    /// `StorageFull` from the store triggers one batch eviction and one retry. Any
    /// remaining failure is logged and swallowed.
    pub(crate) fn write(&self, key: &str, entry: &StoredEntry) -> MediumWrite {
        self.write_if(key, entry, || true).unwrap_or_default()
    }

    /// Like [`write`](Self::write), but only when `admit` holds under the store guard.
    /// `None` means the record was not admitted.
    pub(crate) fn write_if(&self, key: &str, entry: &StoredEntry, admit: impl FnOnce() -> bool) -> Option<MediumWrite> {
        let bytes = match entry.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                log::warn!("medium tier: cannot encode {key}: {e}");
                return Some(MediumWrite::default());
            }
        };
        let mut store = self.store.lock();
        if !admit() {
            return None;
        }
        let mut out = MediumWrite::default();
        let present = matches!(store.get(key), Ok(Some(_)));
        if !present && store.len().unwrap_or(0) >= self.max_entries {
            out.evicted += self.evict_batch(&mut **store);
        }
        match store.put(key, bytes.clone()) {
            Ok(()) => out.stored = true,
            Err(e) if e.is_storage_full() => {
                log::warn!("medium tier: {e}; evicting a batch and retrying {key}");
                out.evicted += self.evict_batch(&mut **store);
                match store.put(key, bytes) {
                    Ok(()) => out.stored = true,
                    Err(e) => log::warn!("medium tier: giving up on {key}: {e}"),
                }
            }
            Err(e) => log::warn!("medium tier: write of {key} failed: {e}"),
        }
        Some(out)
    }

    /// Drop the oldest `ceil(len * fraction)` records in one `get_all`/`set_all` pass.
    /// Unreadable records sort first.
    fn evict_batch(&self, store: &mut dyn MediumStore) -> usize {
        let all = match store.get_all() {
            Ok(all) => all,
            Err(e) => {
                log::warn!("medium tier: batch eviction could not list records: {e}");
                return 0;
            }
        };
        let n = batch_count(all.len(), self.eviction_fraction);
        if n == 0 {
            return 0;
        }
        let mut aged: Vec<(u64, String, Vec<u8>)> = all
            .into_iter()
            .map(|(k, v)| {
                let at = StoredEntry::from_bytes(&v).map_or(0, |e| e.inserted_at);
                (at, k, v)
            })
            .collect();
        aged.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let keep: Vec<(String, Vec<u8>)> = aged.into_iter().skip(n).map(|(_, k, v)| (k, v)).collect();
        let kept = keep.len();
        match store.set_all(keep) {
            Ok(()) => {
                crate::dev6!("medium_batch_evict", "evicted" => n, "kept" => kept);
                n
            }
            Err(e) => {
                log::warn!("medium tier: batch eviction failed: {e}");
                0
            }
        }
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        match self.store.lock().remove(key) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("medium tier: remove of {key} failed: {e}");
                false
            }
        }
    }

    pub(crate) fn clear(&self) {
        if let Err(e) = self.store.lock().clear() {
            log::warn!("medium tier: clear failed: {e}");
        }
    }

    /// Remove expired, stale and unreadable records. Returns the number removed.
    pub(crate) fn purge(&self, now: u64, version: u32) -> Result<usize, CacheError> {
        let mut store = self.store.lock();
        let all = store.get_all()?;
        let before = all.len();
        let keep: Vec<(String, Vec<u8>)> = all
            .into_iter()
            .filter(|(_, v)| {
                StoredEntry::from_bytes(v).is_ok_and(|e| e.validity(now, Some(self.ttl), version).is_fresh())
            })
            .collect();
        let removed = before - keep.len();
        if removed > 0 {
            store.set_all(keep)?;
        }
        Ok(removed)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        matches!(self.store.lock().get(key), Ok(Some(_)))
    }

    pub(crate) fn len(&self) -> usize {
        self.store.lock().len().unwrap_or(0)
    }
}

fn drop_quietly(store: &mut dyn MediumStore, key: &str) {
    if let Err(e) = store.remove(key) {
        log::warn!("medium tier: remove of {key} failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMediumStore;

    fn stored(at: u64) -> StoredEntry {
        StoredEntry { inserted_at: at, schema_version: 1, scope_id: None, source_hash: String::new(), payload: vec![1] }
    }

    #[test]
    fn overflow_evicts_oldest_tenth_in_one_batch() {
        let mem = MemoryMediumStore::new();
        let tier = MediumTier::new(Box::new(mem.clone()), 20, Duration::from_secs(60), 0.10);
        for i in 0..20u64 {
            assert!(tier.write(&format!("k{i:02}"), &stored(i)).stored);
        }
        let w = tier.write("new", &stored(100));
        assert_eq!(w, MediumWrite { evicted: 2, stored: true });
        assert_eq!(tier.len(), 19);
        assert!(!tier.contains("k00"));
        assert!(!tier.contains("k01"));
        assert!(tier.contains("k02"));
    }

    #[test]
    fn quota_failure_retries_after_batch_eviction() {
        let mem = MemoryMediumStore::new();
        let tier = MediumTier::new(Box::new(mem.clone()), 1000, Duration::from_secs(60), 0.5);
        tier.write("a", &stored(1));
        tier.write("b", &stored(2));
        let used = mem.bytes_used();
        mem.set_quota(Some(used));
        let w = tier.write("c", &stored(3));
        assert!(w.stored);
        assert_eq!(w.evicted, 1);
        assert!(!tier.contains("a"));
    }

    #[test]
    fn persistent_quota_failure_is_swallowed() {
        let mem = MemoryMediumStore::with_quota(1);
        let tier = MediumTier::new(Box::new(mem), 10, Duration::from_secs(60), 0.1);
        let w = tier.write("a", &stored(1));
        assert!(!w.stored);
        assert_eq!(tier.len(), 0);
    }

    #[test]
    fn unreadable_record_reads_as_miss_and_is_removed() {
        let mut mem = MemoryMediumStore::new();
        mem.put("junk", vec![0xFF, 0xFF]).unwrap();
        let tier = MediumTier::new(Box::new(mem.clone()), 10, Duration::from_secs(60), 0.1);
        assert!(matches!(tier.read("junk", 0, 1), MediumRead::Miss));
        assert!(mem.is_empty().unwrap());
    }
}
