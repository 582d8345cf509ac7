use swr_cache::prelude::*;
use swr_cache::{Codec, TracingMetrics};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    // 1. Initialize tracing subscriber
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE) // TRACE shows latency events
        .with_target(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return;
    }

    // 2. Orchestrator reporting through TracingMetrics
    let metrics = TracingMetrics::new().with_service_name("example-service");
    let cache = CacheOrchestrator::with_codec_and_metrics(
        MemoryStore::new(),
        Codec::new(),
        metrics,
        CacheConfig::with_prefix("traced"),
    );
    cache.connect().await;

    let opts = SwrOpts::new().ttl_secs(60).stale_ttl_secs(300).timeout_ms(250).build();

    println!("\n⚡ Miss, computed under the lock...");
    let first = cache
        .get_or_stale_then_refresh("user:1", opts, || async { Ok::<_, String>("Alice".to_string()) })
        .await;
    println!("   {} {:?}", first.status, first.data);

    println!("\n⚡ Hit...");
    let second = cache
        .get_or_stale_then_refresh("user:1", opts, || async { Ok::<_, String>("unused".to_string()) })
        .await;
    println!("   {} {:?}", second.status, second.data);

    println!("\n⚡ Generator over budget...");
    let slow = cache
        .get_or_stale_then_refresh("user:2", opts, || async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, String>("Bob".to_string())
        })
        .await;
    println!("   {} {:?}", slow.status, slow.data);

    println!("\n✅ Check your console output for structured logs!");
}
