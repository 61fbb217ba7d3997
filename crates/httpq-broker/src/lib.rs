// In-process rendezvous broker.
// A publish blocks until a consumer takes the payload and a consume blocks
// until a payload arrives, each bounded by a caller-supplied deadline. State is
// kept per topic name in an injected registry; counters are process-wide.
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;

mod registry;
mod rendezvous;
mod stats;
mod topic;

pub use registry::TopicRegistry;
pub use stats::{StatsCounters, StatsSnapshot};
pub use topic::{Topic, TopicDepths};

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(thiserror::Error, Debug)]
pub enum BrokerError {
    #[error("timeout waiting for consumer")]
    ConsumerTimeout,
    #[error("timeout waiting for producer")]
    ProducerTimeout,
    #[error("topic queue full: topic={topic} depth={depth}")]
    QueueFull { topic: String, depth: usize },
}

/// Rendezvous broker.
///
/// ```
/// use bytes::Bytes;
/// use httpq_broker::{Broker, TopicRegistry};
/// use std::time::Duration;
///
/// let broker = std::sync::Arc::new(Broker::new(TopicRegistry::new()));
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
///     let consumer = {
///         let broker = std::sync::Arc::clone(&broker);
///         tokio::spawn(async move { broker.consume("topic", deadline).await })
///     };
///     broker
///         .publish("topic", Bytes::from_static(b"hello"), deadline)
///         .await
///         .expect("publish");
///     let msg = consumer.await.expect("join").expect("consume");
///     assert_eq!(msg, Bytes::from_static(b"hello"));
/// });
/// ```
#[derive(Debug)]
pub struct Broker {
    // Topic name -> queues; created lazily.
    registry: TopicRegistry,
    // Shared across all topics.
    stats: StatsCounters,
    // Per-topic, per-queue bound; 0 disables it.
    max_queue_depth: usize,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(TopicRegistry::new())
    }
}

impl Broker {
    pub fn new(registry: TopicRegistry) -> Self {
        Self {
            registry,
            stats: StatsCounters::new(),
            max_queue_depth: 0,
        }
    }

    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Hand `payload` to a consumer on `topic`, waiting until `deadline`.
    ///
    /// # Errors
    /// - [`BrokerError::ConsumerTimeout`] if no consumer took it in time.
    /// - [`BrokerError::QueueFull`] if the topic already holds the configured
    ///   number of pending messages.
    pub async fn publish(&self, topic: &str, payload: Bytes, deadline: Instant) -> Result<()> {
        metrics::counter!("httpq_publish_total").increment(1);
        let state = self.registry.resolve(topic);
        let result = rendezvous::publish(
            &state,
            topic,
            payload,
            deadline,
            self.max_queue_depth,
            &self.stats,
        )
        .await;
        self.record_rejection(&result);
        result
    }

    /// Take the next payload on `topic`, waiting until `deadline`.
    ///
    /// # Errors
    /// - [`BrokerError::ProducerTimeout`] if nothing was published in time.
    /// - [`BrokerError::QueueFull`] if the topic already holds the configured
    ///   number of waiting consumers.
    pub async fn consume(&self, topic: &str, deadline: Instant) -> Result<Bytes> {
        metrics::counter!("httpq_consume_total").increment(1);
        let state = self.registry.resolve(topic);
        let result =
            rendezvous::consume(&state, topic, deadline, self.max_queue_depth, &self.stats).await;
        self.record_rejection(&result);
        result
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn topic_count(&self) -> usize {
        self.registry.len()
    }

    /// Queue depths of `topic`; an unknown topic reports empty queues and is
    /// not created.
    pub fn topic_depths(&self, topic: &str) -> TopicDepths {
        self.registry
            .get(topic)
            .map(|state| state.depths())
            .unwrap_or_default()
    }

    pub fn evict_idle_topics(&self, ttl: Duration) -> usize {
        self.registry.evict_idle(ttl)
    }

    fn record_rejection<T>(&self, result: &Result<T>) {
        if let Err(BrokerError::QueueFull { topic, depth }) = result {
            metrics::counter!("httpq_queue_full_total").increment(1);
            tracing::warn!(%topic, depth, "topic queue full");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn deadline_in(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    fn spawn_consume(
        broker: &Arc<Broker>,
        topic: &'static str,
        ms: u64,
    ) -> tokio::task::JoinHandle<Result<Bytes>> {
        let broker = Arc::clone(broker);
        tokio::spawn(async move { broker.consume(topic, deadline_in(ms)).await })
    }

    #[tokio::test(start_paused = true)]
    async fn consume_without_publisher_times_out() {
        let broker = Broker::default();
        let start = Instant::now();
        let err = broker
            .consume("x", deadline_in(5_000))
            .await
            .expect_err("timeout");
        assert!(matches!(err, BrokerError::ProducerTimeout));
        assert!(start.elapsed() >= Duration::from_millis(5_000));
        assert_eq!(
            broker.stats(),
            StatsSnapshot {
                sub_fails: 1,
                ..StatsSnapshot::default()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn publish_without_consumer_times_out() {
        let broker = Broker::default();
        let err = broker
            .publish("x", Bytes::from_static(b"hello"), deadline_in(5_000))
            .await
            .expect_err("timeout");
        assert!(matches!(err, BrokerError::ConsumerTimeout));
        assert_eq!(err.to_string(), "timeout waiting for consumer");
        assert_eq!(broker.stats().pub_fails, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_consumer_receives_direct_handoff() {
        let broker = Arc::new(Broker::default());
        let consumer = spawn_consume(&broker, "x", 5_000);
        tokio::time::sleep(Duration::from_millis(100)).await;

        broker
            .publish("x", Bytes::from_static(b"hello"), deadline_in(5_000))
            .await
            .expect("publish");
        let msg = consumer.await.expect("join").expect("consume");
        assert_eq!(msg, Bytes::from_static(b"hello"));

        let stats = broker.stats();
        assert_eq!(stats.rx_bytes, 5);
        assert_eq!(stats.tx_bytes, 5);
        assert_eq!(stats.pub_fails, 0);
        assert_eq!(stats.sub_fails, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn topics_do_not_leak_into_each_other() {
        let broker = Arc::new(Broker::default());
        let publisher = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .publish("A", Bytes::from_static(b"A"), deadline_in(5_000))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = broker
            .consume("B", deadline_in(100))
            .await
            .expect_err("other topic");
        assert!(matches!(err, BrokerError::ProducerTimeout));

        let msg = broker.consume("A", deadline_in(100)).await.expect("consume");
        assert_eq!(msg, Bytes::from_static(b"A"));
        publisher.await.expect("join").expect("publish");
        assert_eq!(broker.topic_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_messages_are_consumed_in_publish_order() {
        let broker = Arc::new(Broker::default());
        let mut publishers = Vec::new();
        for payload in ["1", "2", "3"] {
            let publisher_broker = Arc::clone(&broker);
            publishers.push(tokio::spawn(async move {
                publisher_broker
                    .publish("A", Bytes::from(payload), deadline_in(5_000))
                    .await
            }));
            // Let each publisher enqueue before the next one starts.
            while broker.topic_depths("A").pending_messages < publishers.len() {
                tokio::task::yield_now().await;
            }
        }

        for expected in ["1", "2", "3"] {
            let msg = broker.consume("A", deadline_in(100)).await.expect("consume");
            assert_eq!(msg, Bytes::from(expected));
        }
        for publisher in publishers {
            publisher.await.expect("join").expect("publish");
        }
        let stats = broker.stats();
        assert_eq!(stats.rx_bytes, 3);
        assert_eq!(stats.tx_bytes, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_publishers_and_consumers_all_complete() {
        const N: usize = 64;
        let broker = Arc::new(Broker::default());
        let mut consumers = Vec::new();
        let mut publishers = Vec::new();
        let mut expected_bytes = 0u64;
        for i in 0..N {
            consumers.push(spawn_consume(&broker, "load", 5_000));
            let payload = Bytes::from(format!("payload-{i}"));
            expected_bytes += payload.len() as u64;
            let broker = Arc::clone(&broker);
            publishers.push(tokio::spawn(async move {
                broker.publish("load", payload, deadline_in(5_000)).await
            }));
        }

        let mut received = Vec::new();
        for consumer in consumers {
            received.push(consumer.await.expect("join").expect("consume"));
        }
        for publisher in publishers {
            publisher.await.expect("join").expect("publish");
        }

        received.sort();
        received.dedup();
        assert_eq!(received.len(), N, "every payload delivered exactly once");
        let stats = broker.stats();
        assert_eq!(stats.rx_bytes, expected_bytes);
        assert_eq!(stats.tx_bytes, expected_bytes);
        assert_eq!(stats.pub_fails + stats.sub_fails, 0);
    }

    #[test]
    fn inspecting_depths_does_not_create_topics() {
        let broker = Broker::default();
        assert_eq!(broker.topic_depths("nobody"), TopicDepths::default());
        assert_eq!(broker.topic_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_topics_are_evicted_once_untouched() {
        let broker = Broker::default();
        let _ = broker.consume("gone", deadline_in(10)).await;
        assert_eq!(broker.topic_count(), 1);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(broker.evict_idle_topics(Duration::from_secs(30)), 1);
        assert_eq!(broker.topic_count(), 0);
    }
}
