// SPDX-License-Identifier: MIT

//! Bounded, lossy-on-overflow hand-off queue between the reader and sender.
//!
//! `put` never blocks the producer: a full queue counts a drop and returns
//! immediately. `get` blocks the consumer up to a caller-supplied timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

/// Outcome of a [`QueueProducer::put`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Accepted,
    Dropped,
}

/// Create a bounded queue with the given capacity, returning the producer
/// and consumer halves.
pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        QueueProducer {
            tx,
            dropped: dropped.clone(),
        },
        QueueConsumer { rx, dropped },
    )
}

#[derive(Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl QueueProducer {
    /// Non-blocking enqueue. Never awaits; a full queue is a drop.
    pub fn put(&self, line: String) -> PutOutcome {
        match self.tx.try_send(line) {
            Ok(()) => PutOutcome::Accepted,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PutOutcome::Dropped
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct QueueConsumer {
    rx: mpsc::Receiver<String>,
    dropped: Arc<AtomicU64>,
}

impl QueueConsumer {
    /// Block up to `timeout` for the next line. `None` on timeout or if the
    /// queue has been closed (all producers dropped).
    pub async fn get(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_fifo() {
        let (tx, mut rx) = bounded(4);
        assert_eq!(tx.put("a".into()), PutOutcome::Accepted);
        assert_eq!(tx.put("b".into()), PutOutcome::Accepted);
        assert_eq!(rx.get(Duration::from_millis(50)).await, Some("a".into()));
        assert_eq!(rx.get(Duration::from_millis(50)).await, Some("b".into()));
    }

    #[tokio::test]
    async fn put_never_blocks_and_counts_drops_when_full() {
        let (tx, _rx) = bounded(1);
        assert_eq!(tx.put("a".into()), PutOutcome::Accepted);
        assert_eq!(tx.put("b".into()), PutOutcome::Dropped);
        assert_eq!(tx.dropped_count(), 1);
    }

    #[tokio::test]
    async fn get_times_out_on_empty_queue() {
        let (_tx, mut rx) = bounded(1);
        assert_eq!(rx.get(Duration::from_millis(10)).await, None);
    }
}
