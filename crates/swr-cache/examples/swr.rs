//! Stale-While-Revalidate (SWR) Example
//!
//! Serves a stale value immediately while one background task refreshes
//! it, then shows a full miss once the stale window has passed.

use swr_cache::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() {
    let cache = CacheOrchestrator::with_config(MemoryStore::new(), CacheConfig::with_prefix("demo"));
    let version = Arc::new(AtomicU32::new(0));

    // Fresh for 1 second, served stale for 3 more
    let opts = SwrOpts::new()
        .ttl(Duration::from_secs(1))
        .stale_ttl(Duration::from_secs(4))
        .timeout_ms(500)
        .build();

    println!("=== Stale-While-Revalidate Demo ===\n");
    let start = Instant::now();

    // miss, stale, fresh again after the refresh, expired
    for wait in [0, 2, 1, 5] {
        tokio::time::sleep(Duration::from_secs(wait)).await;

        let version = version.clone();
        let response = cache
            .get_or_stale_then_refresh("dashboard", opts, move || async move {
                // Pretend the source of truth is slow
                tokio::time::sleep(Duration::from_millis(200)).await;
                let v = version.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, String>(format!("Dashboard v{v}"))
            })
            .await;

        println!(
            "T+{}s: {:<10} {:?} (from cache: {}, age: {:?})",
            start.elapsed().as_secs(),
            response.status,
            response.data,
            response.from_cache,
            response.age
        );
    }

    let stats = cache.stats().await;
    println!(
        "\nhits={} stale_hits={} misses={} refreshes={}",
        stats.hits, stats.stale_hits, stats.misses, stats.refreshes_succeeded
    );
}
