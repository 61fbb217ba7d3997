// Topic name -> topic state.
// The registry lock is independent from the per-topic locks and is only held
// for lookup-or-insert and for the idle sweep. Lock order is always
// registry -> topic; the rendezvous protocols never take the registry lock
// while holding a topic lock.
use crate::topic::Topic;
use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, Arc<Topic>, RandomState>>,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Return the topic for `name`, creating an empty one on first reference.
    pub fn resolve(&self, name: &str) -> Arc<Topic> {
        let mut topics = self.topics.lock();
        if let Some(topic) = topics.get(name) {
            return Arc::clone(topic);
        }
        let topic = Arc::new(Topic::new());
        topics.insert(name.to_string(), Arc::clone(&topic));
        metrics::gauge!("httpq_topics").set(topics.len() as f64);
        tracing::debug!(topic = %name, "topic created");
        topic
    }

    /// Look up an existing topic without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.lock().get(name).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.topics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.lock().is_empty()
    }

    /// Drop topics nobody references that have been untouched for `ttl`.
    ///
    /// Every in-flight publish or consume keeps an `Arc<Topic>` for the whole
    /// wait, and new references are only handed out under the registry lock,
    /// so a strong count of one means no caller can observe the removal.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut topics = self.topics.lock();
        let before = topics.len();
        topics.retain(|_, topic| {
            Arc::strong_count(topic) > 1 || now.saturating_duration_since(topic.idle_since()) < ttl
        });
        let evicted = before - topics.len();
        if evicted > 0 {
            metrics::counter!("httpq_topics_evicted_total").increment(evicted as u64);
            metrics::gauge!("httpq_topics").set(topics.len() as f64);
            tracing::info!(evicted, remaining = topics.len(), "evicted idle topics");
        }
        evicted
    }
}
