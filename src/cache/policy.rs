use crate::cache::core::{Shared, State};

/// Key with the smallest timestamp. `iter` runs most-recent first (as `LruCache::iter` does),
/// so ties go to the earliest insertion.
pub(crate) fn oldest_key<'a, V: 'a>(
    iter: impl DoubleEndedIterator<Item = (&'a String, &'a V)>,
    inserted_at: impl Fn(&V) -> u64,
) -> Option<String> {
    iter.rev().min_by_key(|(_, v)| inserted_at(v)).map(|(k, _)| k.clone())
}

/// Evict the entry with the smallest `created_at`. Returns the evicted key.
pub(crate) fn evict_oldest<T>(state: &mut State<T>) -> Option<String> {
    let victim = oldest_key(state.entries.iter(), |e| e.created_at)?;
    state.entries.pop(&victim);
    state.stats.evictions += 1;
    state.stats.size = crate::utils::num::usize_to_u64(state.entries.len());
    Some(victim)
}

/// Removes expired entries. Returns number evicted.
///
/// The key list is snapshotted once, then the lock is re-taken per batch so a large
/// store does not starve foreground `get`/`set`. Each key is re-checked under the lock
/// because a foreground call may have replaced or removed it in between.
pub(crate) fn sweep_expired<T>(shared: &Shared<T>) -> usize {
    let keys: Vec<String> = shared.state.lock().entries.iter().map(|(k, _)| k.clone()).collect();
    let mut evicted = 0usize;
    for batch in keys.chunks(shared.config.sweep_batch_size) {
        let now = shared.clock.now_millis();
        let mut guard = shared.state.lock();
        let state = &mut *guard;
        for key in batch {
            if state.entries.peek(key).is_some_and(|e| e.is_expired(now)) {
                state.entries.pop(key);
                state.stats.evictions += 1;
                evicted += 1;
            }
        }
        state.stats.size = crate::utils::num::usize_to_u64(state.entries.len());
    }
    if evicted > 0 {
        crate::dev6!("ttl_sweep", "cache" => shared.config.name, "evicted" => evicted);
    }
    evicted
}
