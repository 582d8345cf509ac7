//! Integration tests for CacheOrchestrator

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::{CacheMeta, CacheMetrics, CacheOperation, Codec, KeySpace, RefreshOutcome};
    use parking_lot::Mutex;
    use serde::Serialize;
    use std::future::{pending, ready, Ready};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    const PREFIX: &str = "test";
    const HOUR: Duration = Duration::from_secs(3600);

    type Outcome<T> = std::result::Result<T, String>;

    fn cache(store: &MemoryStore) -> CacheOrchestrator<MemoryStore> {
        CacheOrchestrator::with_config(store.clone(), CacheConfig::with_prefix(PREFIX))
    }

    fn opts() -> SwrOptions {
        SwrOpts::new()
            .ttl_secs(60)
            .stale_ttl_secs(300)
            .timeout_ms(1000)
            .build()
    }

    /// Write a record whose meta claims it was created `age` ago
    async fn seed<T: Serialize>(store: &MemoryStore, key: &str, value: &T, age: Duration) {
        let codec = Codec::new();
        let keys = KeySpace::new(PREFIX);
        let meta = CacheMeta::created_at(
            SystemTime::now() - age,
            Duration::from_secs(60),
            Duration::from_secs(300),
        );
        store
            .set(&keys.data_key(key), &codec.encode_value(value).unwrap(), HOUR)
            .await
            .unwrap();
        store
            .set(&keys.meta_key(key), &codec.encode_meta(&meta).unwrap(), HOUR)
            .await
            .unwrap();
    }

    /// Generator that counts its calls and resolves immediately
    fn counting<T: Send + 'static>(
        calls: &Arc<AtomicUsize>,
        value: T,
    ) -> impl FnOnce() -> Ready<Outcome<T>> + Send + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Ok(value))
        }
    }

    fn failing(calls: &Arc<AtomicUsize>) -> impl FnOnce() -> Ready<Outcome<Vec<u32>>> + Send + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Err("source of truth unavailable".to_string()))
        }
    }

    /// Generator that panics when called
    fn exploding() -> impl FnOnce() -> Ready<Outcome<Vec<u32>>> + Send + 'static {
        || -> Ready<Outcome<Vec<u32>>> { panic!("source of truth exploded") }
    }

    /// Metrics sink that remembers which operations reported latency
    #[derive(Clone, Default)]
    struct RecordingMetrics {
        latencies: Arc<Mutex<Vec<CacheOperation>>>,
    }

    impl RecordingMetrics {
        fn count(&self, operation: CacheOperation) -> usize {
            self.latencies.lock().iter().filter(|op| **op == operation).count()
        }
    }

    impl CacheMetrics for RecordingMetrics {
        fn record_hit(&self, _key: &str) {}
        fn record_stale_hit(&self, _key: &str) {}
        fn record_miss(&self, _key: &str) {}
        fn record_refresh(&self, _key: &str, _outcome: RefreshOutcome, _background: bool) {}
        fn record_lock_contention(&self, _key: &str) {}

        fn record_latency(&self, operation: CacheOperation, _duration: Duration) {
            self.latencies.lock().push(operation);
        }
    }

    #[tokio::test]
    async fn test_fresh_record_is_ready() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "actors:list", &vec![1, 2, 3], Duration::from_secs(30)).await;

        let response = cache
            .get_or_stale_then_refresh("actors:list", opts(), counting(&calls, vec![9]))
            .await;

        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(vec![1, 2, 3]));
        assert!(response.from_cache);
        let age = response.age.unwrap();
        assert!(age >= Duration::from_secs(30) && age < Duration::from_secs(31));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fresh_just_inside_ttl() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        // One second inside the window to absorb test latency
        seed(&store, "k", &"v", Duration::from_secs(59)).await;

        let response = cache
            .get_or_stale_then_refresh("k", opts(), counting(&calls, "new".to_string()))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_served_with_single_background_refresh() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "report", &vec![1, 2, 3], Duration::from_secs(90)).await;

        for _ in 0..5 {
            let calls = calls.clone();
            let response = cache
                .get_or_stale_then_refresh("report", opts(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, String>(vec![4, 5, 6])
                })
                .await;

            assert_eq!(response.status, CacheStatus::Stale);
            assert_eq!(response.data, Some(vec![1, 2, 3]));
            assert!(response.from_cache);
            assert!(response.age.unwrap() > Duration::from_secs(60));
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let response = cache
            .get_or_stale_then_refresh("report", opts(), counting(&calls, vec![0]))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(vec![4, 5, 6]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.stale_hits, 5);
        assert_eq!(stats.refreshes_started, 1);
        assert_eq!(stats.refreshes_succeeded, 1);
        assert_eq!(stats.lock_contention, 4);
        assert_eq!(stats.locks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_background_refresh_keeps_stale_value() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "report", &vec![1u32], Duration::from_secs(90)).await;

        let response = cache
            .get_or_stale_then_refresh("report", opts(), failing(&calls))
            .await;
        assert_eq!(response.status, CacheStatus::Stale);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Old record untouched, lock released
        let response = cache
            .get_or_stale_then_refresh("report", opts(), failing(&calls))
            .await;
        assert_eq!(response.status, CacheStatus::Stale);
        assert_eq!(response.data, Some(vec![1]));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.refreshes_failed, 2);
    }

    #[tokio::test]
    async fn test_expired_record_is_a_miss() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "report", &vec![1, 2, 3], Duration::from_secs(301)).await;

        let response = cache
            .get_or_stale_then_refresh("report", opts(), counting(&calls, vec![7, 8]))
            .await;

        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(vec![7, 8]));
        assert!(!response.from_cache);
        assert_eq!(response.age, Some(Duration::ZERO));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Persisted with fresh metadata
        let response = cache
            .get_or_stale_then_refresh("report", opts(), counting(&calls, vec![0]))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(vec![7, 8]));
        assert!(response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_call_generator_once() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_stale_then_refresh("heavy", opts(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok::<_, String>(42u64)
                    })
                    .await
            }));
        }

        let mut computed = 0;
        for handle in handles {
            let response = handle.await.unwrap();
            assert_eq!(response.status, CacheStatus::Ready);
            assert_eq!(response.data, Some(42));
            if !response.from_cache {
                computed += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(computed, 1);
        assert_eq!(cache.stats().await.lock_contention, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stampede_guard_spans_instances() {
        // Two orchestrators sharing one store stand in for two processes
        let store = MemoryStore::new();
        let first = cache(&store);
        let second = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, String>("shared".to_string())
            }
        };

        let (a, b) = tokio::join!(
            first.get_or_stale_then_refresh("k", opts(), slow(calls.clone())),
            second.get_or_stale_then_refresh("k", opts(), slow(calls.clone())),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data.as_deref(), Some("shared"));
        assert_eq!(b.data.as_deref(), Some("shared"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_held_elsewhere_returns_refreshing() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(cache.lock_manager().acquire("busy").await);

        let start = tokio::time::Instant::now();
        let response = cache
            .get_or_stale_then_refresh("busy", opts(), counting(&calls, 1u8))
            .await;

        assert_eq!(response.status, CacheStatus::Refreshing);
        assert_eq!(response.data, None);
        assert!(response.should_retry());
        assert_eq!(start.elapsed(), cache.config().lock_wait);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_store_always_recomputes() {
        let store = MemoryStore::new();
        let cache = CacheOrchestrator::with_config(
            store.clone(),
            CacheConfig::with_prefix(PREFIX).disabled(),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let response = cache
                .get_or_stale_then_refresh("k", opts(), counting(&calls, vec![1]))
                .await;
            assert_eq!(response.status, CacheStatus::Ready);
            assert!(!response.from_cache);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(!cache.set("k", &1, HOUR).await);
        assert_eq!(cache.get::<i32>("k").await, None);
        assert!(!cache.del("k").await);
        assert_eq!(cache.flush().await, 0);
        assert!(cache.lock_manager().acquire("k").await);
        assert!(cache.lock_manager().acquire("k").await);
        assert!(store.is_empty());

        let stats = cache.stats().await;
        assert!(!stats.enabled);
        assert!(!stats.ready);
    }

    #[tokio::test]
    async fn test_store_outage_degrades_to_recompute() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "k", &"cached", Duration::from_secs(1)).await;
        store.set_available(false);

        let response = cache
            .get_or_stale_then_refresh("k", opts(), counting(&calls, "computed".to_string()))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some("computed".to_string()));
        assert!(!response.from_cache);
        assert!(!cache.is_ready());

        let response = cache
            .get_or_stale_then_refresh("k", opts(), counting(&calls, "again".to_string()))
            .await;
        assert_eq!(response.data, Some("again".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.set_available(true);
        assert!(cache.reconnect().await);
        assert!(cache.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_generator_times_out() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let options = SwrOpts::new().ttl_secs(60).timeout_ms(100).build();

        let start = tokio::time::Instant::now();
        let response = cache
            .get_or_stale_then_refresh("slow", options, || pending::<Outcome<u32>>())
            .await;

        assert_eq!(response.status, CacheStatus::Timeout);
        assert_eq!(response.data, None);
        assert!(response.should_retry());
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        // Lock released for the next caller
        assert!(cache.lock_manager().acquire("slow").await);
        assert_eq!(cache.stats().await.timeouts, 1);
    }

    #[tokio::test]
    async fn test_generator_error_falls_back_to_expired_value() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        // Logically expired, still physically present
        seed(&store, "report", &vec![1u32, 2], Duration::from_secs(400)).await;

        let response = cache
            .get_or_stale_then_refresh("report", opts(), failing(&calls))
            .await;

        assert_eq!(response.status, CacheStatus::Timeout);
        assert_eq!(response.data, Some(vec![1, 2]));
        assert!(response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.refreshes_failed, 1);
        assert_eq!(stats.timeouts, 1);
    }

    #[tokio::test]
    async fn test_generator_error_without_fallback() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        let response = cache
            .get_or_stale_then_refresh("report", opts(), failing(&calls))
            .await;
        assert_eq!(response.status, CacheStatus::Timeout);
        assert_eq!(response.data, None);
        assert!(!response.from_cache);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_persisted_by_default() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let options = SwrOpts::new().ttl_secs(60).timeout_ms(100).build();

        let response = cache
            .get_or_stale_then_refresh("late", options, || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, String>(7u32)
            })
            .await;
        assert_eq!(response.status, CacheStatus::Timeout);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<u32>("late").await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_discarded_when_configured() {
        let store = MemoryStore::new();
        let cache = CacheOrchestrator::with_config(
            store.clone(),
            CacheConfig::with_prefix(PREFIX).late_results(LateResultPolicy::Discard),
        );
        let options = SwrOpts::new().ttl_secs(60).timeout_ms(100).build();

        let response = cache
            .get_or_stale_then_refresh("late", options, || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, String>(7u32)
            })
            .await;
        assert_eq!(response.status, CacheStatus::Timeout);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<u32>("late").await, None);
    }

    #[tokio::test]
    async fn test_empty_values_classified_as_empty() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        let response = cache
            .get_or_stale_then_refresh("none", opts(), counting(&calls, Vec::<u32>::new()))
            .await;
        assert_eq!(response.status, CacheStatus::Empty);
        assert_eq!(response.data, Some(vec![]));
        assert!(!response.from_cache);

        // Cached as empty, not recomputed
        let response = cache
            .get_or_stale_then_refresh("none", opts(), counting(&calls, vec![1u32]))
            .await;
        assert_eq!(response.status, CacheStatus::Empty);
        assert!(response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_record_is_a_miss() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        store
            .set("test:garbled", b"\x00not json", HOUR)
            .await
            .unwrap();
        store.set("test:meta:garbled", b"{", HOUR).await.unwrap();

        let response = cache
            .get_or_stale_then_refresh("garbled", opts(), counting(&calls, 5u8))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get::<u8>("garbled").await, Some(5));
    }

    #[tokio::test]
    async fn test_plain_set_is_fresh_without_age() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        // An old SWR record must not age out a plain write
        seed(&store, "k", &1, Duration::from_secs(400)).await;
        assert!(cache.set("k", &2, HOUR).await);
        assert_eq!(cache.get::<i32>("k").await, Some(2));

        let response = cache
            .get_or_stale_then_refresh("k", opts(), counting(&calls, 3))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(2));
        assert_eq!(response.age, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_or_set() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = cache
            .get_or_set("config", HOUR, counting(&calls, "v1".to_string()))
            .await;
        assert_eq!(value, Ok("v1".to_string()));

        let value = cache
            .get_or_set("config", HOUR, counting(&calls, "v2".to_string()))
            .await;
        assert_eq!(value, Ok("v1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let failed = cache.get_or_set("broken", HOUR, failing(&calls)).await;
        assert_eq!(failed, Err("source of truth unavailable".to_string()));
        assert_eq!(cache.get::<Vec<u32>>("broken").await, None);
    }

    #[tokio::test]
    async fn test_get_set_del() {
        let store = MemoryStore::new();
        let cache = cache(&store);

        assert!(cache.set(("user", 42), &"alice", HOUR).await);
        assert_eq!(cache.get::<String>("user:42").await, Some("alice".to_string()));
        assert!(store.get("test:user:42").await.unwrap().is_some());

        assert!(cache.del("user:42").await);
        assert!(!cache.del("user:42").await);
        assert_eq!(cache.get::<String>("user:42").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["ns:a", "ns:b", "other:c"] {
            cache
                .get_or_stale_then_refresh(key, opts(), counting(&calls, key.to_string()))
                .await;
        }
        assert!(cache.lock_manager().acquire("ns:held").await);

        // Two data keys and two meta keys
        assert_eq!(cache.invalidate("ns:*").await, 4);

        assert_eq!(cache.get::<String>("ns:a").await, None);
        assert_eq!(cache.get::<String>("ns:b").await, None);
        assert_eq!(cache.get::<String>("other:c").await, Some("other:c".to_string()));
        // Locks survive invalidation
        assert!(!cache.lock_manager().acquire("ns:held").await);

        let response = cache
            .get_or_stale_then_refresh("ns:a", opts(), counting(&calls, "again".to_string()))
            .await;
        assert!(!response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_flush_and_stats() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        store.set("elsewhere:x", b"1", HOUR).await.unwrap();

        for key in ["a", "b", "c"] {
            cache
                .get_or_stale_then_refresh(key, opts(), counting(&calls, 1u8))
                .await;
        }
        assert!(cache.set("plain", &1u8, HOUR).await);
        cache.lock_manager().acquire("a").await;

        let stats = cache.stats().await;
        assert!(stats.enabled);
        assert!(stats.ready);
        assert_eq!(stats.keys, 4);
        assert_eq!(stats.meta_keys, 3);
        assert_eq!(stats.locks, 1);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.refreshes_succeeded, 3);

        assert_eq!(cache.flush().await, 7);
        let stats = cache.stats().await;
        assert_eq!(stats.keys, 0);
        assert_eq!(stats.locks, 1);
        assert!(store.get("elsewhere:x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_local_layer_serves_and_evicts() {
        let store = MemoryStore::new();
        let cache = CacheOrchestrator::with_config(
            store.clone(),
            CacheConfig::with_prefix(PREFIX).local_ttl(Duration::from_secs(60)),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_stale_then_refresh("hot", opts(), counting(&calls, 1u32))
            .await;

        // Removed behind the orchestrator's back: the local copy still answers
        store.delete(&["test:hot", "test:meta:hot"]).await.unwrap();
        let response = cache
            .get_or_stale_then_refresh("hot", opts(), counting(&calls, 2u32))
            .await;
        assert_eq!(response.data, Some(1));
        assert!(response.from_cache);

        // Explicit deletes evict it
        cache.del("hot").await;
        let response = cache
            .get_or_stale_then_refresh("hot", opts(), counting(&calls, 3u32))
            .await;
        assert_eq!(response.data, Some(3));
        assert!(!response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_list_timeline() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));

        // t=30: fresh
        seed(&store, "actors:list", &vec![1, 2, 3], Duration::from_secs(30)).await;
        let response = cache
            .get_or_stale_then_refresh("actors:list", opts(), counting(&calls, vec![4, 5, 6]))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(vec![1, 2, 3]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // t=90: stale, refresh scheduled
        seed(&store, "actors:list", &vec![1, 2, 3], Duration::from_secs(90)).await;
        let response = cache
            .get_or_stale_then_refresh("actors:list", opts(), counting(&calls, vec![4, 5, 6]))
            .await;
        assert_eq!(response.status, CacheStatus::Stale);
        assert_eq!(response.data, Some(vec![1, 2, 3]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // t=301: past the stale window, recomputed inline
        seed(&store, "actors:list", &vec![1, 2, 3], Duration::from_secs(301)).await;
        let response = cache
            .get_or_stale_then_refresh("actors:list", opts(), counting(&calls, vec![7]))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(vec![7]));
        assert!(!response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_sees_value_written_while_it_waited() {
        let store = MemoryStore::new();
        let waiter = CacheOrchestrator::with_config(
            store.clone(),
            CacheConfig::with_prefix(PREFIX).local_ttl(Duration::from_secs(60)),
        );
        let holder = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "report", &1u32, Duration::from_secs(400)).await;
        assert!(holder.lock_manager().acquire("report").await);

        // The lock holder stores a fresh value while the waiter sleeps
        let writer = {
            let store = store.clone();
            let holder = holder.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                seed(&store, "report", &2u32, Duration::ZERO).await;
                holder.lock_manager().release("report").await;
            })
        };

        let response = waiter
            .get_or_stale_then_refresh("report", opts(), counting(&calls, 9u32))
            .await;
        writer.await.unwrap();

        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(2));
        assert!(response.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_local_layer_memoises_only_fresh_records() {
        let store = MemoryStore::new();
        let cache = CacheOrchestrator::with_config(
            store.clone(),
            CacheConfig::with_prefix(PREFIX).local_ttl(Duration::from_secs(60)),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        seed(&store, "k", &1u32, Duration::from_secs(90)).await;
        // Someone else is refreshing, so this process only serves stale
        assert!(cache.lock_manager().acquire("k").await);

        let response = cache
            .get_or_stale_then_refresh("k", opts(), counting(&calls, 9u32))
            .await;
        assert_eq!(response.status, CacheStatus::Stale);
        assert_eq!(response.data, Some(1));

        // The refresher's write is visible on the next read
        seed(&store, "k", &2u32, Duration::ZERO).await;
        let response = cache
            .get_or_stale_then_refresh("k", opts(), counting(&calls, 9u32))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_background_refresh_releases_lock() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        seed(&store, "report", &vec![1u32], Duration::from_secs(90)).await;

        let response = cache
            .get_or_stale_then_refresh("report", opts(), exploding())
            .await;
        assert_eq!(response.status, CacheStatus::Stale);
        assert_eq!(response.data, Some(vec![1]));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = cache.stats().await;
        assert_eq!(stats.refreshes_started, 1);
        assert_eq!(stats.refreshes_failed, 1);
        assert_eq!(stats.locks, 0);
        assert!(cache.lock_manager().acquire("report").await);
    }

    #[tokio::test]
    async fn test_panicking_generator_releases_lock() {
        for policy in [LateResultPolicy::Persist, LateResultPolicy::Discard] {
            let store = MemoryStore::new();
            let cache = CacheOrchestrator::with_config(
                store.clone(),
                CacheConfig::with_prefix(PREFIX).late_results(policy),
            );

            let response = cache
                .get_or_stale_then_refresh("boom", opts(), exploding())
                .await;
            assert_eq!(response.status, CacheStatus::Timeout, "{policy:?}");
            assert_eq!(response.data, None);
            assert!(cache.lock_manager().acquire("boom").await, "{policy:?}");
            assert_eq!(cache.stats().await.refreshes_failed, 1);
        }
    }

    #[tokio::test]
    async fn test_reserved_keys_bypass_the_store() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(cache.lock_manager().acquire("x").await);
        let marker = Some(cache.lock_manager().marker().as_bytes().to_vec());

        // "lock:x" would alias the lock for "x"
        assert!(!cache.set("lock:x", &1, HOUR).await);
        assert_eq!(cache.get::<i32>("lock:x").await, None);
        assert!(!cache.del("lock:x").await);
        assert_eq!(store.get("test:lock:x").await.unwrap(), marker);

        let response = cache
            .get_or_stale_then_refresh("meta:y", opts(), counting(&calls, 5u8))
            .await;
        assert_eq!(response.status, CacheStatus::Ready);
        assert_eq!(response.data, Some(5));
        assert!(!response.from_cache);

        let value = cache.get_or_set("lock:z", HOUR, counting(&calls, 6u8)).await;
        assert_eq!(value, Ok(6));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_latency_recorded_on_hit_and_miss() {
        let metrics = RecordingMetrics::default();
        let cache = CacheOrchestrator::with_codec_and_metrics(
            MemoryStore::new(),
            Codec::new(),
            metrics.clone(),
            CacheConfig::with_prefix(PREFIX),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_set("k", HOUR, counting(&calls, 1u32)).await.unwrap();
        cache.get_or_set("k", HOUR, counting(&calls, 2u32)).await.unwrap();
        assert!(cache.get_or_set("k2", HOUR, failing(&calls)).await.is_err());

        assert_eq!(metrics.count(CacheOperation::GetOrSet), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
