//! Periodic idle-topic eviction.
use httpq_broker::Broker;
use std::sync::Arc;
use std::time::Duration;

/// Evict topics idle for longer than `ttl` every `interval`, forever.
pub async fn run_topic_sweeper(broker: Arc<Broker>, ttl: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; nothing can be idle yet.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let evicted = broker.evict_idle_topics(ttl);
        tracing::debug!(evicted, remaining = broker.topic_count(), "topic sweep");
    }
}
