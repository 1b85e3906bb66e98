use crate::errors::CacheError;
use crate::store::{DurableStore, MediumStore};
use crate::telemetry::{StatsReport, TelemetrySink};
use crate::tiered::config::TieredConfig;
use crate::tiered::entry::{DerivationEntry, StoredEntry, Tier, TierHit, Validity};
use crate::tiered::fast::{FastRead, FastTier};
use crate::tiered::key::DerivationKey;
use crate::tiered::medium::{MediumRead, MediumTier};
use crate::tiered::reporter::Reporter;
use crate::tiered::slow::SlowTier;
use crate::tiered::stats::{TieredMetrics, TieredStats, add, bump};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::num::usize_to_u64;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const SOURCE: &str = "derivation";

/// State shared between the cache handle and its background reporter.
pub(crate) struct Shared<T> {
    config: TieredConfig,
    clock: RwLock<Arc<dyn Clock>>,
    fast: FastTier<T>,
    medium: MediumTier,
    metrics: Arc<TieredMetrics>,
    telemetry: RwLock<Option<Arc<dyn TelemetrySink>>>,
    /// Bumped before every invalidation; a lookup that sees it move does not promote.
    generation: AtomicU64,
}

impl<T> Shared<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn now(&self) -> u64 {
        self.clock.read().now_millis()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn begin_invalidation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn purge_expired_now(&self) -> usize {
        let now = self.now();
        let version = self.config.schema_version;
        let fast = self.fast.purge(now, version);
        let medium = match self.medium.purge(now, version) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("tiered cache: medium purge failed: {e}");
                0
            }
        };
        add(&self.metrics.fast_evictions, usize_to_u64(fast));
        add(&self.metrics.medium_evictions, usize_to_u64(medium));
        if fast + medium > 0 {
            crate::dev6!("tiered_purge", "fast" => fast, "medium" => medium);
        }
        fast + medium
    }

    fn stats(&self) -> TieredStats {
        self.metrics.snapshot(usize_to_u64(self.fast.len()), usize_to_u64(self.medium.len()))
    }

    pub(crate) fn publish_stats(&self) {
        let sink = self.telemetry.read().clone();
        if let Some(sink) = sink {
            sink.publish(&self.stats().report(SOURCE));
        }
    }

    fn insert_fast(&self, key: &DerivationKey, entry: DerivationEntry<T>) {
        if let Some(victim) = self.fast.insert(key.as_str(), entry) {
            self.note_fast_victim(&victim);
        }
    }

    /// Promote into Fast unless an invalidation started after `seen`.
    fn promote_fast(&self, key: &DerivationKey, entry: DerivationEntry<T>, seen: u64) -> bool {
        match self.fast.insert_if(key.as_str(), entry, || self.generation() == seen) {
            Some(victim) => {
                if let Some(victim) = victim {
                    self.note_fast_victim(&victim);
                }
                true
            }
            None => false,
        }
    }

    fn note_fast_victim(&self, victim: &str) {
        bump(&self.metrics.fast_evictions);
        crate::dev6!("lru_evict", "cache" => SOURCE, "tier" => "fast", "key" => victim);
    }

    fn write_medium(&self, key: &DerivationKey, stored: &StoredEntry) {
        let w = self.medium.write(key.as_str(), stored);
        self.note_medium_write(w.evicted, w.stored);
    }

    /// Promote into Medium unless an invalidation started after `seen`.
    fn promote_medium(&self, key: &DerivationKey, stored: &StoredEntry, seen: u64) -> bool {
        match self.medium.write_if(key.as_str(), stored, || self.generation() == seen) {
            Some(w) => {
                self.note_medium_write(w.evicted, w.stored);
                true
            }
            None => false,
        }
    }

    fn note_medium_write(&self, evicted: usize, stored: bool) {
        add(&self.metrics.medium_evictions, usize_to_u64(evicted));
        if !stored {
            bump(&self.metrics.medium_write_failures);
        }
    }

    fn note_dropped(&self, tier: Tier, why: Validity) {
        match why {
            Validity::StaleVersion => bump(&self.metrics.stale_versions),
            Validity::Expired => match tier {
                Tier::Fast => bump(&self.metrics.fast_evictions),
                Tier::Medium => bump(&self.metrics.medium_evictions),
                Tier::Slow => {}
            },
            Validity::Fresh => {}
        }
        log::trace!("tiered cache: {why:?} entry dropped from {} tier", tier.as_str());
    }
}

/// Three-tier cache for one deterministic derivation.
///
/// Lookups walk Fast -> Medium -> Slow and copy hits into every faster tier. The cache
/// never runs the derivation; on a miss the caller computes and calls [`set`](Self::set).
/// Capacity and availability failures are logged and degrade to misses.
pub struct TieredDerivationCache<T> {
    shared: Arc<Shared<T>>,
    slow: Option<SlowTier>,
    reporter: Option<Reporter>,
}

impl<T> TieredDerivationCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Builds the cache. With a durable store the Slow tier writer is spawned on the
    /// current tokio runtime, and so is the periodic reporter when one is configured
    /// and a runtime is available.
    ///
    /// # Errors
    /// `CacheError::Config` for an invalid config, `CacheError::NoRuntime` when a
    /// durable store is given outside a tokio runtime.
    pub fn new(
        config: TieredConfig,
        medium_store: Box<dyn MediumStore>,
        durable_store: Option<Arc<dyn DurableStore>>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let metrics = Arc::new(TieredMetrics::default());
        let slow = match durable_store {
            Some(store) => Some(SlowTier::spawn(store, Arc::clone(&metrics))?),
            None => None,
        };
        log::info!(
            "tiered cache: schema v{}, fast {} entries, medium {} entries, slow tier {}",
            config.schema_version,
            config.fast_max_entries,
            config.medium_max_entries,
            if slow.is_some() { "attached" } else { "absent" }
        );
        let shared = Arc::new(Shared {
            fast: FastTier::new(config.fast_max_entries, config.fast_ttl),
            medium: MediumTier::new(
                medium_store,
                config.medium_max_entries,
                config.medium_ttl,
                config.medium_eviction_fraction,
            ),
            metrics,
            telemetry: RwLock::new(None),
            clock: RwLock::new(Arc::new(SystemClock)),
            generation: AtomicU64::new(0),
            config,
        });
        let reporter = shared.config.report_interval.and_then(|every| Reporter::spawn(Arc::clone(&shared), every));
        Ok(Self { shared, slow, reporter })
    }

    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        *self.shared.clock.write() = clock;
        self
    }

    #[must_use]
    pub fn with_telemetry(self, sink: Arc<dyn TelemetrySink>) -> Self {
        *self.shared.telemetry.write() = Some(sink);
        self
    }

    /// Looks up `locator` and reports which tier answered.
    ///
    /// A hit read before a concurrent [`invalidate`](Self::invalidate) or
    /// [`clear_all`](Self::clear_all) is still returned but not promoted.
    pub async fn lookup(&self, locator: &str, scope_id: Option<&str>) -> Option<TierHit<T>> {
        let shared = &self.shared;
        let key = DerivationKey::new(locator, scope_id);
        let version = shared.config.schema_version;
        let seen = shared.generation();
        let now = shared.now();

        match shared.fast.read(key.as_str(), now, version) {
            FastRead::Hit(value) => {
                bump(&shared.metrics.fast_hits);
                return Some(TierHit { value, tier: Tier::Fast });
            }
            FastRead::Dropped(why) => shared.note_dropped(Tier::Fast, why),
            FastRead::Miss => {}
        }

        match shared.medium.read(key.as_str(), now, version) {
            MediumRead::Hit(stored) => match stored.decode::<T>() {
                Ok(entry) => {
                    bump(&shared.metrics.medium_hits);
                    if shared.promote_fast(&key, entry.restamped(now), seen) {
                        bump(&shared.metrics.promotions);
                    } else {
                        log::debug!("tiered cache: {key} invalidated during lookup, not promoted");
                    }
                    return Some(TierHit { value: entry.result, tier: Tier::Medium });
                }
                Err(e) => {
                    log::warn!("tiered cache: medium record {key} does not decode: {e}");
                    shared.medium.remove(key.as_str());
                }
            },
            MediumRead::Dropped(why) => shared.note_dropped(Tier::Medium, why),
            MediumRead::Miss => {}
        }

        // no Fast or Medium guard is held past this point
        if let (Some(slow), Some(scope)) = (&self.slow, scope_id)
            && let Some(hit) = self.lookup_slow(slow, &key, scope, seen).await
        {
            return Some(hit);
        }

        bump(&shared.metrics.misses);
        None
    }

    async fn lookup_slow(&self, slow: &SlowTier, key: &DerivationKey, scope: &str, seen: u64) -> Option<TierHit<T>> {
        let shared = &self.shared;
        let stored = slow.get(key.as_str(), scope).await?;
        let version = shared.config.schema_version;
        let now = shared.now();
        let validity = stored.validity(now, shared.config.slow_ttl, version);
        if !validity.is_fresh() {
            shared.note_dropped(Tier::Slow, validity);
            return None;
        }
        let entry = match stored.decode::<T>() {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("tiered cache: slow record {key} does not decode: {e}");
                return None;
            }
        };
        bump(&shared.metrics.slow_hits);
        let promoted =
            shared.promote_medium(key, &stored.restamped(now), seen) && shared.promote_fast(key, entry.restamped(now), seen);
        if promoted {
            bump(&shared.metrics.promotions);
        } else {
            log::debug!("tiered cache: {key} invalidated during slow read, not promoted");
        }
        Some(TierHit { value: entry.result, tier: Tier::Slow })
    }

    /// Value for `locator`, or `None` when every consulted tier misses.
    pub async fn get(&self, locator: &str, scope_id: Option<&str>) -> Option<T> {
        self.lookup(locator, scope_id).await.map(|hit| hit.value)
    }

    /// Stores a freshly computed result in Fast and Medium, and queues a Slow write
    /// when scoped. Never fails; tier write problems are logged.
    pub fn set(&self, locator: &str, result: T, scope_id: Option<&str>) {
        let shared = &self.shared;
        let key = DerivationKey::new(locator, scope_id);
        let entry = DerivationEntry {
            result,
            inserted_at: shared.now(),
            schema_version: shared.config.schema_version,
            scope_id: scope_id.map(str::to_string),
            source_hash: key.source_hash().to_string(),
        };
        let stored = match StoredEntry::encode(&entry) {
            Ok(stored) => Some(stored),
            Err(e) => {
                log::warn!("tiered cache: cannot encode result for {key}: {e}");
                None
            }
        };
        shared.insert_fast(&key, entry);
        if let Some(stored) = stored {
            shared.write_medium(&key, &stored);
            if let (Some(slow), Some(scope)) = (&self.slow, scope_id) {
                slow.enqueue_put(key.as_str(), scope, stored);
            }
        }
        bump(&shared.metrics.sets);
    }

    /// Drops `locator` from Fast and Medium now and queues a Slow removal when scoped.
    /// Returns whether Fast or Medium held it.
    pub fn invalidate(&self, locator: &str, scope_id: Option<&str>) -> bool {
        let key = DerivationKey::new(locator, scope_id);
        self.shared.begin_invalidation();
        let in_fast = self.shared.fast.remove(key.as_str());
        let in_medium = self.shared.medium.remove(key.as_str());
        if let (Some(slow), Some(scope)) = (&self.slow, scope_id) {
            slow.enqueue_remove(key.as_str(), scope);
        }
        log::debug!("tiered cache: invalidated {key} (fast={in_fast}, medium={in_medium})");
        in_fast || in_medium
    }

    /// Empties Fast and Medium. The Slow tier is left alone.
    pub fn clear_all(&self) {
        self.shared.begin_invalidation();
        self.shared.fast.clear();
        self.shared.medium.clear();
        log::info!("tiered cache: fast and medium tiers cleared");
    }

    /// Drop expired and stale-version entries from Fast and Medium. Returns the number
    /// removed.
    pub fn purge_expired_now(&self) -> usize {
        self.shared.purge_expired_now()
    }

    /// Whether `tier` currently holds a record for the key, valid or not. Always false
    /// for [`Tier::Slow`], which is not inspected synchronously.
    #[must_use]
    pub fn contains(&self, tier: Tier, locator: &str, scope_id: Option<&str>) -> bool {
        let key = DerivationKey::new(locator, scope_id);
        match tier {
            Tier::Fast => self.shared.fast.contains(key.as_str()),
            Tier::Medium => self.shared.medium.contains(key.as_str()),
            Tier::Slow => false,
        }
    }

    /// Wait for every queued Slow tier write and removal to be applied.
    pub async fn flush(&self) {
        if let Some(slow) = &self.slow {
            slow.flush().await;
        }
    }

    /// Stop the reporter, drain the Slow tier queue and join both tasks. Later Slow
    /// writes are dropped.
    pub async fn shutdown(&self) {
        if let Some(reporter) = &self.reporter {
            reporter.shutdown().await;
        }
        if let Some(slow) = &self.slow {
            slow.shutdown().await;
        }
        self.publish_stats();
    }

    #[must_use]
    pub fn stats(&self) -> TieredStats {
        self.shared.stats()
    }

    #[must_use]
    pub fn report(&self) -> StatsReport {
        self.stats().report(SOURCE)
    }

    pub fn publish_stats(&self) {
        self.shared.publish_stats();
    }

    #[must_use]
    pub fn config(&self) -> &TieredConfig {
        &self.shared.config
    }
}
