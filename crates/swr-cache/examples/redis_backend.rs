use swr_cache::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // REDIS_HOST / REDIS_PORT / REDIS_PASSWORD / REDIS_DB, defaulting to localhost
    let store = RedisStore::new(RedisConfig::from_env().pool_size(5))?;
    println!("Connecting to Redis at {}:{}", store.config().host, store.config().port);

    let cache = CacheOrchestrator::with_config(store, CacheConfig::from_env());

    // The cache works with or without Redis; without it every call recomputes
    if !cache.connect().await {
        eprintln!("Redis unreachable, running uncached");
    }

    let opts = SwrOpts::new()
        .ttl(Duration::from_secs(60))
        .stale_ttl(Duration::from_secs(300))
        .timeout(Duration::from_secs(2))
        .build();

    for _ in 0..2 {
        let response = cache
            .get_or_stale_then_refresh("actors:list", opts, || async {
                Ok::<_, String>(vec!["Ada", "Grace", "Linus"])
            })
            .await;
        println!(
            "{}: {:?} (from cache: {})",
            response.status, response.data, response.from_cache
        );
    }

    // Plain cache-aside
    let greeting = cache
        .get_or_set("hello", Duration::from_secs(300), || async {
            Ok::<_, String>("world".to_string())
        })
        .await?;
    println!("hello = {greeting}");

    let stats = cache.stats().await;
    println!(
        "ready={} keys={} meta_keys={} locks={}",
        stats.ready, stats.keys, stats.meta_keys, stats.locks
    );

    let removed = cache.invalidate("actors:*").await;
    println!("invalidated {removed} keys");

    Ok(())
}
