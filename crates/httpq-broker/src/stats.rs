// Byte and failure counters shared by every topic.
// Each field is updated independently; readers get a best-effort snapshot.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StatsCounters {
    // Payload bytes handed to consumers.
    rx_bytes: AtomicU64,
    // Payload bytes moved out of publishers.
    tx_bytes: AtomicU64,
    // Publishes that hit their deadline.
    pub_fails: AtomicU64,
    // Consumes that hit their deadline.
    sub_fails: AtomicU64,
}

/// Point-in-time view of [`StatsCounters`].
///
/// Fields are read one after another, so a snapshot taken during a transfer
/// may include the rx side of it but not yet the tx side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub pub_fails: u64,
    pub sub_fails: u64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_rx(&self, n: usize) {
        self.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_tx(&self, n: usize) {
        self.tx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn increment_pub_fail(&self) {
        self.pub_fails.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("httpq_publish_timeouts_total").increment(1);
    }

    pub fn increment_sub_fail(&self) {
        self.sub_fails.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("httpq_consume_timeouts_total").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            pub_fails: self.pub_fails.load(Ordering::Relaxed),
            sub_fails: self.sub_fails.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_start_at_zero() {
        let stats = StatsCounters::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn counters_move_independently() {
        let stats = StatsCounters::new();
        stats.increment_rx(5);
        stats.increment_tx(7);
        stats.increment_tx(1);
        stats.increment_pub_fail();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rx_bytes, 5);
        assert_eq!(snapshot.tx_bytes, 8);
        assert_eq!(snapshot.pub_fails, 1);
        assert_eq!(snapshot.sub_fails, 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(StatsCounters::new());
        let handles = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.increment_rx(2);
                        stats.increment_sub_fail();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("join");
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rx_bytes, 16_000);
        assert_eq!(snapshot.sub_fails, 8_000);
    }

    #[test]
    fn snapshot_serializes_with_wire_field_names() {
        let snapshot = StatsSnapshot {
            rx_bytes: 1,
            tx_bytes: 2,
            pub_fails: 3,
            sub_fails: 4,
        };
        let value = serde_json::to_value(snapshot).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"rx_bytes": 1, "tx_bytes": 2, "pub_fails": 3, "sub_fails": 4})
        );
    }
}
