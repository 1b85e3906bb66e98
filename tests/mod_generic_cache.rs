use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tiercache::{CacheConfig, CacheStats, GenericCache, HitRateGrade, ManualClock, MemorySink, TelemetrySink};

fn cache_at(max_size: usize, clock: &Arc<ManualClock>) -> GenericCache<String> {
    GenericCache::with_clock(CacheConfig::with_max_size(max_size), clock.clone())
}

#[test]
fn test_round_trip_before_ttl() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    cache.set("user:1", "alice".to_string(), Duration::from_secs(1), &[]);
    clock.set(1_000);
    assert_eq!(cache.get("user:1").as_deref(), Some("alice"));
    let s = cache.stats();
    assert_eq!((s.hits, s.sets, s.size), (1, 1, 1));
}

#[test]
fn test_capacity_evicts_oldest_insert() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(2, &clock);
    cache.set("A", "a".into(), Duration::from_secs(60), &[]);
    clock.set(1);
    cache.set("B", "b".into(), Duration::from_secs(60), &[]);
    clock.set(2);
    // reading A does not protect it
    assert!(cache.get("A").is_some());
    cache.set("C", "c".into(), Duration::from_secs(60), &[]);
    assert!(!cache.contains("A"));
    assert!(cache.contains("B"));
    assert!(cache.contains("C"));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_overwrite_at_capacity_keeps_others() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(2, &clock);
    cache.set("A", "a".into(), Duration::from_secs(60), &[]);
    cache.set("B", "b".into(), Duration::from_secs(60), &[]);
    cache.set("B", "b2".into(), Duration::from_secs(60), &[]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("B").as_deref(), Some("b2"));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_expired_get_counts_miss_and_eviction() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    cache.set("k", "v".into(), Duration::from_millis(1_000), &[]);
    let before = cache.stats();
    clock.set(1_500);
    assert!(cache.get("k").is_none());
    let after = cache.stats();
    assert_eq!(after.misses, before.misses + 1);
    assert_eq!(after.evictions, before.evictions + 1);
    assert_eq!(after.size, 0);
}

#[test]
fn test_invalidate_by_pattern_or_tags() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    let ttl = Duration::from_secs(60);
    cache.set("api:/users/1", "u1".into(), ttl, &["users"]);
    cache.set("api:/users/2", "u2".into(), ttl, &["users", "tenant-a"]);
    cache.set("api:/orders/9", "o9".into(), ttl, &["orders"]);
    cache.set("summary:daily", "s".into(), ttl, &["tenant-a"]);

    assert_eq!(cache.invalidate(None, None), 0);
    assert_eq!(cache.len(), 4);

    // one entry matches both conditions and is counted once
    assert_eq!(cache.invalidate(Some("/users/"), Some(&["tenant-a"])), 3);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains("api:/orders/9"));
    assert_eq!(cache.stats().evictions, 3);
}

#[test]
fn test_clear_empties_store_but_keeps_counters() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    cache.set("a", "1".into(), Duration::from_secs(60), &[]);
    let _ = cache.get("a");
    cache.clear();
    assert!(cache.is_empty());
    let s = cache.stats();
    assert_eq!(s, CacheStats { hits: 1, misses: 0, sets: 1, evictions: 0, size: 0 });
}

#[test]
fn test_purge_expired_now_is_authoritative_without_sweeper() {
    let clock = Arc::new(ManualClock::new(0));
    let config = CacheConfig { sweep_batch_size: 2, ..CacheConfig::with_max_size(100) };
    let cache: GenericCache<u32> = GenericCache::with_clock(config, clock.clone());
    for i in 0..7 {
        cache.set(format!("short{i}"), i, Duration::from_millis(10), &[]);
    }
    cache.set("long", 99, Duration::from_secs(60), &[]);
    clock.set(11);
    assert_eq!(cache.purge_expired_now(), 7);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().evictions, 7);
}

#[test]
fn test_compute_error_stores_nothing() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    let r: Result<String, String> = cache.get_or_insert_with("k", Duration::from_secs(1), &[], || Err("upstream 503".into()));
    assert_eq!(r.unwrap_err(), "upstream 503");
    assert!(!cache.contains("k"));

    let mut calls = 0;
    for _ in 0..2 {
        let r: Result<String, String> = cache.get_or_insert_with("k", Duration::from_secs(1), &[], || {
            calls += 1;
            Ok("fresh".into())
        });
        assert_eq!(r.unwrap(), "fresh");
    }
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_get_or_fetch_propagates_error() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    let err = cache
        .get_or_fetch("api:/slow", Duration::from_secs(1), &["api"], async { Err::<String, _>(std::io::Error::other("timeout")) })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "timeout");
    assert!(!cache.contains("api:/slow"));

    let ok = cache
        .get_or_fetch("api:/slow", Duration::from_secs(1), &["api"], async { Ok::<_, std::io::Error>("body".to_string()) })
        .await
        .unwrap();
    assert_eq!(ok, "body");
    assert_eq!(cache.get("api:/slow").as_deref(), Some("body"));
}

#[test]
fn test_report_grades_hit_rate() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(10, &clock);
    cache.set("a", "1".into(), Duration::from_secs(60), &[]);
    for _ in 0..9 {
        let _ = cache.get("a");
    }
    let _ = cache.get("missing");
    let r = cache.report();
    assert_eq!(r.source, "generic");
    assert!((r.hit_rate - 0.9).abs() < 1e-9);
    assert_eq!(r.grade, HitRateGrade::Good);
}

#[test]
fn test_sweeper_publishes_and_shutdown_joins() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(MemorySink::default());
    let config = CacheConfig { sweep_interval: Duration::from_millis(5), ..CacheConfig::with_max_size(10) };
    let cache: GenericCache<u8> =
        GenericCache::with_parts(config, clock.clone(), Some(sink.clone() as Arc<dyn TelemetrySink>));
    cache.set("x", 1, Duration::from_millis(1), &[]);
    clock.set(10);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while cache.len() > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    cache.shutdown();
    cache.shutdown();
    assert_eq!(cache.len(), 0);
    assert!(!sink.reports().is_empty());
}

#[test]
fn test_concurrent_mixed_ops_keep_cap_and_counters() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 500;
    const MAX: usize = 16;
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(MAX, &clock);
    let gets = Arc::new(AtomicU64::new(0));
    let sets = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = cache.clone();
            let gets = Arc::clone(&gets);
            let sets = Arc::clone(&sets);
            std::thread::spawn(move || {
                for i in 0..ROUNDS {
                    let key = format!("k{}", (t * 7 + i) % 40);
                    match i % 10 {
                        0..=3 => {
                            cache.set(key, format!("{t}-{i}"), Duration::from_secs(60), &["hot"]);
                            sets.fetch_add(1, Ordering::Relaxed);
                        }
                        9 => {
                            cache.invalidate(Some(&key), None);
                        }
                        _ => {
                            let _ = cache.get(&key);
                            gets.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    assert!(cache.len() <= MAX);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let s = cache.stats();
    assert_eq!(s.hits + s.misses, gets.load(Ordering::Relaxed));
    assert_eq!(s.sets, sets.load(Ordering::Relaxed));
    assert!(cache.len() <= MAX);
    assert_eq!(s.size, cache.len() as u64);
    cache.shutdown();
}
