// Publish and consume protocols.
//
// Both sides follow the same shape: under the topic lock either match an
// existing counterpart or enqueue themselves, then (lock released) race a
// oneshot against the deadline. On timeout the entry is removed under the lock
// again; if it is already gone the counterpart won the race and the operation
// completes instead of failing.
use crate::stats::StatsCounters;
use crate::topic::{PendingMessage, Topic, WaitingReceiver};
use crate::{BrokerError, Result};
use bytes::Bytes;
use tokio::time::{Instant, timeout_at};

enum PublishStep {
    Handoff(WaitingReceiver),
    Queued(u64, tokio::sync::oneshot::Receiver<()>),
}

enum ConsumeStep {
    Take(PendingMessage),
    Waiting(u64, tokio::sync::oneshot::Receiver<Bytes>),
}

pub(crate) async fn publish(
    topic: &Topic,
    name: &str,
    mut payload: Bytes,
    deadline: Instant,
    max_depth: usize,
    stats: &StatsCounters,
) -> Result<()> {
    let len = payload.len();
    let (id, mut ack) = loop {
        let step = {
            let mut queues = topic.lock();
            match queues.try_match_consumer() {
                Some(receiver) => PublishStep::Handoff(receiver),
                None => {
                    let (id, ack) = queues.enqueue_message(name, payload.clone(), max_depth)?;
                    PublishStep::Queued(id, ack)
                }
            }
        };
        match step {
            // No await between matching and delivering: a matched receiver is
            // always either filled or handed its payload back.
            PublishStep::Handoff(receiver) => match receiver.deliver(payload) {
                Ok(()) => {
                    stats.increment_tx(len);
                    tracing::debug!(topic = %name, bytes = len, "direct handoff");
                    return Ok(());
                }
                Err(returned) => {
                    // Consumer dropped after being matched; try the next one.
                    payload = returned;
                }
            },
            PublishStep::Queued(id, ack) => break (id, ack),
        }
    };
    tracing::debug!(topic = %name, bytes = len, "publish queued");

    // The ack receiver must outlive the relock below; dropping it would mark the
    // queued message abandoned and let a consumer discard it in the gap.
    match timeout_at(deadline, &mut ack).await {
        // A dropped ack sender also means a consumer dequeued the message.
        Ok(_) => Ok(()),
        Err(_) => {
            if topic.lock().remove_message(id) {
                stats.increment_pub_fail();
                tracing::debug!(topic = %name, "publish timed out");
                Err(BrokerError::ConsumerTimeout)
            } else {
                // A consumer took it between the deadline and the relock.
                Ok(())
            }
        }
    }
}

pub(crate) async fn consume(
    topic: &Topic,
    name: &str,
    deadline: Instant,
    max_depth: usize,
    stats: &StatsCounters,
) -> Result<Bytes> {
    let step = {
        let mut queues = topic.lock();
        match queues.try_match_producer() {
            Some(message) => ConsumeStep::Take(message),
            None => {
                let (id, inbox) = queues.enqueue_receiver(name, max_depth)?;
                ConsumeStep::Waiting(id, inbox)
            }
        }
    };

    let (id, mut inbox) = match step {
        ConsumeStep::Take(message) => {
            let len = message.len();
            stats.increment_rx(len);
            stats.increment_tx(len);
            tracing::debug!(topic = %name, bytes = len, "dequeued pending message");
            return Ok(message.complete());
        }
        ConsumeStep::Waiting(id, inbox) => (id, inbox),
    };
    tracing::debug!(topic = %name, "consumer waiting");

    let delivered = match timeout_at(deadline, &mut inbox).await {
        Ok(delivered) => delivered.ok(),
        Err(_) => {
            if topic.lock().remove_receiver(id) {
                None
            } else {
                // Already matched by a publisher that is handing over outside
                // the lock; the slot is filled without further waiting.
                inbox.await.ok()
            }
        }
    };

    match delivered {
        Some(payload) => {
            stats.increment_rx(payload.len());
            Ok(payload)
        }
        None => {
            stats.increment_sub_fail();
            tracing::debug!(topic = %name, "consume timed out");
            Err(BrokerError::ProducerTimeout)
        }
    }
}
