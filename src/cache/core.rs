use crate::cache::config::CacheConfig;
use crate::cache::entry::CacheEntry;
use crate::cache::metrics::CacheStats;
use crate::cache::policy::{evict_oldest, sweep_expired};
use crate::cache::sweeper::Sweeper;
use crate::telemetry::{StatsReport, TelemetrySink};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::num::usize_to_u64;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Map plus counters; always mutated under one lock.
pub(crate) struct State<T> {
    /// Ordered by insertion. Reads use `peek` so access never reorders.
    pub entries: LruCache<String, CacheEntry<T>>,
    pub stats: CacheStats,
}

pub(crate) struct Shared<T> {
    pub config: CacheConfig,
    pub clock: Arc<dyn Clock>,
    pub state: Mutex<State<T>>,
    pub telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl<T> Shared<T> {
    pub(crate) fn stats(&self) -> CacheStats {
        let st = self.state.lock();
        CacheStats { size: usize_to_u64(st.entries.len()), ..st.stats }
    }

    pub(crate) fn publish_stats(&self) {
        if let Some(sink) = &self.telemetry {
            sink.publish(&self.stats().report(&self.config.name));
        }
    }
}

/// A thread-safe, bounded, expiring, taggable memoization store.
///
/// Handles are cheap to clone and share one store. The background sweeper stops when
/// [`shutdown`](Self::shutdown) is called or the last handle is dropped.
pub struct GenericCache<T> {
    shared: Arc<Shared<T>>,
    sweeper: Arc<Mutex<Option<Sweeper>>>,
}

impl<T> Clone for GenericCache<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), sweeper: Arc::clone(&self.sweeper) }
    }
}

impl<T: Clone + Send + 'static> GenericCache<T> {
    /// Creates a cache on the system clock and starts the sweeper.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), None)
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(config, clock, None)
    }

    /// Full constructor. When `telemetry` is set, every sweep pass publishes a report.
    pub fn with_parts(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        telemetry: Option<Arc<dyn TelemetrySink>>,
    ) -> Self {
        let config = config.normalized();
        let shared = Arc::new(Shared {
            config,
            clock,
            state: Mutex::new(State { entries: LruCache::unbounded(), stats: CacheStats::default() }),
            telemetry,
        });
        let sweeper = Sweeper::spawn(Arc::clone(&shared));
        Self { shared, sweeper: Arc::new(Mutex::new(sweeper)) }
    }

    /// Returns the value for `key` if present and unexpired.
    ///
    /// Expired entries are removed on the spot and count as one eviction plus one miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.shared.clock.now_millis();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let expired = match state.entries.peek(key) {
            None => {
                state.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            state.entries.pop(key);
            state.stats.evictions += 1;
            state.stats.misses += 1;
            state.stats.size = usize_to_u64(state.entries.len());
            return None;
        }
        state.stats.hits += 1;
        state.entries.peek(key).map(|e| e.data.clone())
    }

    /// Inserts or overwrites `key`. A new key arriving at a full store first evicts the
    /// entry with the oldest `created_at`; recency of access does not matter.
    pub fn set(&self, key: impl Into<String>, data: T, ttl: Duration, tags: &[&str]) {
        let key = key.into();
        let now = self.shared.clock.now_millis();
        let entry = CacheEntry::new(key.clone(), data, now, ttl, tags);
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if !state.entries.contains(&key)
            && state.entries.len() >= self.shared.config.max_size
            && let Some(victim) = evict_oldest(state)
        {
            crate::dev6!("lru_evict", "cache" => self.shared.config.name, "key" => victim);
        }
        state.entries.put(key, entry);
        state.stats.sets += 1;
        state.stats.size = usize_to_u64(state.entries.len());
    }

    /// Removes every entry whose key contains `pattern` or whose tags intersect `tags`.
    /// With neither argument nothing is removed. Returns the number removed.
    pub fn invalidate(&self, pattern: Option<&str>, tags: Option<&[&str]>) -> usize {
        if pattern.is_none() && tags.is_none() {
            return 0;
        }
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let victims: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.matches(pattern, tags))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            state.entries.pop(key);
        }
        state.stats.evictions += usize_to_u64(victims.len());
        state.stats.size = usize_to_u64(state.entries.len());
        if !victims.is_empty() {
            log::debug!(
                "cache {}: invalidated {} entries (pattern={:?}, tags={:?})",
                self.shared.config.name,
                victims.len(),
                pattern,
                tags
            );
        }
        victims.len()
    }

    /// Empties the store. Counters other than `size` are left alone.
    pub fn clear(&self) {
        let mut st = self.shared.state.lock();
        st.entries.clear();
        st.stats.size = 0;
    }

    /// Run one sweep pass now. Returns number evicted.
    pub fn purge_expired_now(&self) -> usize {
        sweep_expired(&self.shared)
    }

    /// Memoize a computation. On a miss `compute` runs without the lock held; an error is
    /// logged with the key and returned unchanged, and nothing is stored.
    pub fn get_or_insert_with<E, F>(&self, key: &str, ttl: Duration, tags: &[&str], compute: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        match compute() {
            Ok(value) => {
                self.set(key, value.clone(), ttl, tags);
                Ok(value)
            }
            Err(e) => {
                log::warn!("cache {}: compute for key {key} failed: {e}", self.shared.config.name);
                Err(e)
            }
        }
    }

    /// Async form of [`get_or_insert_with`](Self::get_or_insert_with) for API fetches.
    /// No retries happen here; retry policy belongs to the caller.
    pub async fn get_or_fetch<E, Fut>(&self, key: &str, ttl: Duration, tags: &[&str], fetch: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        match fetch.await {
            Ok(value) => {
                self.set(key, value.clone(), ttl, tags);
                Ok(value)
            }
            Err(e) => {
                log::warn!("cache {}: fetch for key {key} failed: {e}", self.shared.config.name);
                Err(e)
            }
        }
    }

    /// True if `key` is stored, expired or not. Does not touch counters.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.shared.state.lock().entries.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.shared.stats()
    }

    #[must_use]
    pub fn report(&self) -> StatsReport {
        self.stats().report(&self.shared.config.name)
    }

    /// Push the current stats to the attached sink, if any.
    pub fn publish_stats(&self) {
        self.shared.publish_stats();
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Stops and joins the sweeper. Safe to call more than once.
    pub fn shutdown(&self) {
        let sweeper = self.sweeper.lock().take();
        drop(sweeper);
    }
}
