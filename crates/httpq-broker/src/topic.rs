// Per-topic rendezvous state.
// Both queues live behind one topic-scoped lock; the lock is only ever held
// for O(1) queue surgery and never across an await.
use crate::{BrokerError, Result};
use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A published payload parked until a consumer takes it.
#[derive(Debug)]
pub(crate) struct PendingMessage {
    id: u64,
    payload: Bytes,
    // Fired once a consumer has taken the payload.
    ack: oneshot::Sender<()>,
}

impl PendingMessage {
    pub(crate) fn len(&self) -> usize {
        self.payload.len()
    }

    // The publisher went away (request dropped); nobody is waiting on the ack.
    fn is_abandoned(&self) -> bool {
        self.ack.is_closed()
    }

    /// Take the payload and release the waiting publisher.
    pub(crate) fn complete(self) -> Bytes {
        // A closed ack means the publisher already gave up; the payload is
        // still ours to deliver.
        let _ = self.ack.send(());
        self.payload
    }
}

/// A single-slot inbox for a blocked consumer.
#[derive(Debug)]
pub(crate) struct WaitingReceiver {
    id: u64,
    slot: oneshot::Sender<Bytes>,
}

impl WaitingReceiver {
    fn is_abandoned(&self) -> bool {
        self.slot.is_closed()
    }

    /// Hand the payload over. Returns it back if the consumer vanished
    /// between being matched and the handoff.
    pub(crate) fn deliver(self, payload: Bytes) -> std::result::Result<(), Bytes> {
        self.slot.send(payload)
    }
}

/// Queue depths of a topic, stale entries included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicDepths {
    pub pending_messages: usize,
    pub waiting_receivers: usize,
}

#[derive(Debug)]
pub(crate) struct TopicQueues {
    messages: VecDeque<PendingMessage>,
    waiting: VecDeque<WaitingReceiver>,
    // Entry ids are unique per topic and only used for timeout removal.
    next_id: u64,
    last_touched: Instant,
}

impl TopicQueues {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Pop the oldest live waiting receiver, dropping abandoned ones on the way.
    pub(crate) fn try_match_consumer(&mut self) -> Option<WaitingReceiver> {
        while let Some(receiver) = self.waiting.pop_front() {
            if !receiver.is_abandoned() {
                return Some(receiver);
            }
        }
        None
    }

    /// Pop the oldest pending message whose publisher is still waiting.
    pub(crate) fn try_match_producer(&mut self) -> Option<PendingMessage> {
        while let Some(message) = self.messages.pop_front() {
            if !message.is_abandoned() {
                return Some(message);
            }
        }
        None
    }

    pub(crate) fn enqueue_message(
        &mut self,
        topic: &str,
        payload: Bytes,
        max_depth: usize,
    ) -> Result<(u64, oneshot::Receiver<()>)> {
        if max_depth > 0 && self.messages.len() >= max_depth {
            self.messages.retain(|message| !message.is_abandoned());
            if self.messages.len() >= max_depth {
                return Err(BrokerError::QueueFull {
                    topic: topic.to_string(),
                    depth: max_depth,
                });
            }
        }
        let id = self.next_id();
        let (ack, done) = oneshot::channel();
        self.messages.push_back(PendingMessage { id, payload, ack });
        Ok((id, done))
    }

    pub(crate) fn enqueue_receiver(
        &mut self,
        topic: &str,
        max_depth: usize,
    ) -> Result<(u64, oneshot::Receiver<Bytes>)> {
        if max_depth > 0 && self.waiting.len() >= max_depth {
            self.waiting.retain(|receiver| !receiver.is_abandoned());
            if self.waiting.len() >= max_depth {
                return Err(BrokerError::QueueFull {
                    topic: topic.to_string(),
                    depth: max_depth,
                });
            }
        }
        let id = self.next_id();
        let (slot, inbox) = oneshot::channel();
        self.waiting.push_back(WaitingReceiver { id, slot });
        Ok((id, inbox))
    }

    /// Remove a pending message that timed out. `false` means a consumer
    /// already dequeued it.
    pub(crate) fn remove_message(&mut self, id: u64) -> bool {
        match self.messages.iter().position(|message| message.id == id) {
            Some(index) => self.messages.remove(index).is_some(),
            None => false,
        }
    }

    /// Remove a waiting receiver that timed out. `false` means a publisher
    /// already matched it.
    pub(crate) fn remove_receiver(&mut self, id: u64) -> bool {
        match self.waiting.iter().position(|receiver| receiver.id == id) {
            Some(index) => self.waiting.remove(index).is_some(),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct Topic {
    queues: Mutex<TopicQueues>,
}

impl Default for Topic {
    fn default() -> Self {
        Self::new()
    }
}

impl Topic {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(TopicQueues {
                messages: VecDeque::new(),
                waiting: VecDeque::new(),
                next_id: 0,
                last_touched: Instant::now(),
            }),
        }
    }

    /// Enter the topic's critical section.
    pub(crate) fn lock(&self) -> MutexGuard<'_, TopicQueues> {
        let mut queues = self.queues.lock();
        queues.last_touched = Instant::now();
        queues
    }

    pub fn depths(&self) -> TopicDepths {
        let queues = self.queues.lock();
        TopicDepths {
            pending_messages: queues.messages.len(),
            waiting_receivers: queues.waiting.len(),
        }
    }

    // Does not touch the topic.
    pub(crate) fn idle_since(&self) -> Instant {
        self.queues.lock().last_touched
    }
}
