use crate::error::HandoffError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// What a sender does when the hand-off is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for the consumer to make room
    #[default]
    Block,
    /// Evict the oldest queued item to make room
    DropOldest,
    /// Discard the item being sent
    DropNewest,
}

/// Result of a successful send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    DisplacedOldest,
    DroppedNewest,
}

/// Counters for one hand-off
#[derive(Debug, Default)]
pub struct HandoffStats {
    /// Items accepted into the queue
    pub items_sent: AtomicU64,
    /// Items taken by the consumer
    pub items_received: AtomicU64,
    /// Queued items evicted under `DropOldest`
    pub items_displaced: AtomicU64,
    /// Incoming items discarded under `DropNewest`
    pub items_dropped: AtomicU64,
}

impl HandoffStats {
    pub fn snapshot(&self) -> HandoffStatsSnapshot {
        HandoffStatsSnapshot {
            items_sent: self.items_sent.load(Ordering::Relaxed),
            items_received: self.items_received.load(Ordering::Relaxed),
            items_displaced: self.items_displaced.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandoffStatsSnapshot {
    pub items_sent: u64,
    pub items_received: u64,
    pub items_displaced: u64,
    pub items_dropped: u64,
}

struct Shared<T> {
    name: String,
    capacity: usize,
    policy: OverflowPolicy,
    queue: Mutex<VecDeque<T>>,
    senders: AtomicUsize,
    receiver_alive: AtomicBool,
    item_ready: Notify,
    space_ready: Notify,
    stats: HandoffStats,
}

/// Producer half; clone for additional producers
pub struct HandoffSender<T> {
    shared: Arc<Shared<T>>,
}

/// Single consumer half
pub struct HandoffReceiver<T> {
    shared: Arc<Shared<T>>,
}

/// Create a bounded single-consumer hand-off between two pipeline stages.
///
/// Closing follows channel semantics: once every sender is dropped the
/// receiver drains what is queued and then sees `None`; once the receiver is
/// dropped every send fails with [`HandoffError::Closed`].
pub fn handoff<T>(
    name: impl Into<String>,
    capacity: usize,
    policy: OverflowPolicy,
) -> (HandoffSender<T>, HandoffReceiver<T>) {
    let name = name.into();
    let capacity = capacity.max(1);

    debug!(
        "Created hand-off '{}' with capacity {} and {:?} overflow policy",
        name, capacity, policy
    );

    let shared = Arc::new(Shared {
        name,
        capacity,
        policy,
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        senders: AtomicUsize::new(1),
        receiver_alive: AtomicBool::new(true),
        item_ready: Notify::new(),
        space_ready: Notify::new(),
        stats: HandoffStats::default(),
    });

    (
        HandoffSender {
            shared: Arc::clone(&shared),
        },
        HandoffReceiver { shared },
    )
}

impl<T> HandoffSender<T> {
    /// Hand an item to the consumer, applying the overflow policy when full
    pub async fn send(&self, item: T) -> Result<SendOutcome, HandoffError> {
        let shared = &self.shared;
        let mut item = Some(item);

        loop {
            let space = shared.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            if !shared.receiver_alive.load(Ordering::Acquire) {
                return Err(HandoffError::Closed(shared.name.clone()));
            }

            {
                let mut queue = shared.queue.lock();

                if queue.len() < shared.capacity {
                    if let Some(item) = item.take() {
                        queue.push_back(item);
                    }
                    drop(queue);
                    shared.stats.items_sent.fetch_add(1, Ordering::Relaxed);
                    shared.item_ready.notify_one();
                    trace!("Hand-off '{}' accepted item", shared.name);
                    return Ok(SendOutcome::Delivered);
                }

                match shared.policy {
                    OverflowPolicy::DropOldest => {
                        queue.pop_front();
                        if let Some(item) = item.take() {
                            queue.push_back(item);
                        }
                        drop(queue);
                        shared.stats.items_sent.fetch_add(1, Ordering::Relaxed);
                        shared.stats.items_displaced.fetch_add(1, Ordering::Relaxed);
                        shared.item_ready.notify_one();
                        warn!("Hand-off '{}' full, displaced oldest item", shared.name);
                        return Ok(SendOutcome::DisplacedOldest);
                    }
                    OverflowPolicy::DropNewest => {
                        shared.stats.items_dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("Hand-off '{}' full, dropped incoming item", shared.name);
                        return Ok(SendOutcome::DroppedNewest);
                    }
                    OverflowPolicy::Block => {}
                }
            }

            trace!("Hand-off '{}' full, waiting for space", shared.name);
            space.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.receiver_alive.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn stats(&self) -> HandoffStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for HandoffSender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("Last sender of hand-off '{}' dropped", self.shared.name);
            self.shared.item_ready.notify_waiters();
        }
    }
}

impl<T> HandoffReceiver<T> {
    /// Next item in FIFO order. Returns `None` once every sender is gone and
    /// the queue is drained. Cancel-safe.
    pub async fn recv(&mut self) -> Option<T> {
        let shared = Arc::clone(&self.shared);

        loop {
            let ready = shared.item_ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            if let Some(item) = self.try_recv() {
                return Some(item);
            }

            if shared.senders.load(Ordering::Acquire) == 0 {
                return None;
            }

            ready.await;
        }
    }

    /// Take an item without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        let item = self.shared.queue.lock().pop_front();
        if item.is_some() {
            self.shared.stats.items_received.fetch_add(1, Ordering::Relaxed);
            self.shared.space_ready.notify_one();
        }
        item
    }

    /// Refuse further sends; queued items stay available to `try_recv`
    pub fn close(&mut self) {
        if self.shared.receiver_alive.swap(false, Ordering::AcqRel) {
            debug!("Hand-off '{}' closed by consumer", self.shared.name);
            self.shared.space_ready.notify_waiters();
        }
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.shared.policy
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn stats(&self) -> HandoffStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<T> Drop for HandoffReceiver<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_items_arrive_in_order() {
        let (tx, mut rx) = handoff("order", 4, OverflowPolicy::Block);

        for i in 0..4 {
            assert_eq!(tx.send(i).await.unwrap(), SendOutcome::Delivered);
        }
        assert_eq!(rx.len(), 4);

        for i in 0..4 {
            assert_eq!(rx.recv().await, Some(i));
        }
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_drop_oldest_displaces_front() {
        let (tx, mut rx) = handoff("oldest", 2, OverflowPolicy::DropOldest);

        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(tx.send(3).await.unwrap(), SendOutcome::DisplacedOldest);

        assert_eq!(rx.try_recv(), Some(2));
        assert_eq!(rx.try_recv(), Some(3));
        assert_eq!(rx.stats().items_displaced, 1);
    }

    #[tokio::test]
    async fn test_drop_newest_discards_incoming() {
        let (tx, mut rx) = handoff("newest", 1, OverflowPolicy::DropNewest);

        tx.send("kept").await.unwrap();
        assert_eq!(tx.send("lost").await.unwrap(), SendOutcome::DroppedNewest);

        assert_eq!(rx.try_recv(), Some("kept"));
        assert_eq!(rx.try_recv(), None);
        assert_eq!(tx.stats().items_dropped, 1);
    }

    #[tokio::test]
    async fn test_block_waits_for_space() {
        let (tx, mut rx) = handoff("block", 1, OverflowPolicy::Block);
        tx.send(1u32).await.unwrap();

        let blocked = tokio::spawn(async move {
            let outcome = tx.send(2u32).await;
            (tx, outcome)
        });

        // Still full, so the producer stays parked
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        assert_eq!(rx.recv().await, Some(1));
        let (_tx, outcome) = timeout(Duration::from_secs(1), blocked)
            .await
            .expect("sender should wake")
            .unwrap();
        assert_eq!(outcome.unwrap(), SendOutcome::Delivered);
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_receiver_drains_after_senders_drop() {
        let (tx, mut rx) = handoff("drain", 4, OverflowPolicy::Block);
        let second = tx.clone();

        tx.send(1).await.unwrap();
        second.send(2).await.unwrap();
        drop(tx);
        drop(second);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_waiting_receiver_wakes_on_close() {
        let (tx, mut rx) = handoff::<u8>("wake", 2, OverflowPolicy::Block);

        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(tx);

        let received = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should observe close")
            .unwrap();
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn test_waiting_receiver_gets_later_items() {
        let (tx, mut rx) = handoff::<u8>("later", 2, OverflowPolicy::Block);

        let waiter = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(item) = rx.recv().await {
                seen.push(item);
            }
            seen
        });

        for i in 0..3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let seen = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should drain and finish")
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_send_fails_after_receiver_drop() {
        let (tx, rx) = handoff("gone", 2, OverflowPolicy::Block);
        drop(rx);

        assert!(tx.is_closed());
        assert_eq!(
            tx.send(1).await,
            Err(HandoffError::Closed("gone".to_string()))
        );
    }

    #[tokio::test]
    async fn test_blocked_sender_released_by_receiver_drop() {
        let (tx, rx) = handoff("release", 1, OverflowPolicy::Block);
        tx.send(1).await.unwrap();

        let blocked = tokio::spawn(async move { tx.send(2).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(rx);

        let outcome = timeout(Duration::from_secs(1), blocked)
            .await
            .expect("sender should be released")
            .unwrap();
        assert!(outcome.is_err());
    }

    #[test]
    fn test_overflow_policy_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            overflow: OverflowPolicy,
        }

        let parsed: Wrapper = toml::from_str("overflow = \"drop_newest\"").unwrap();
        assert_eq!(parsed.overflow, OverflowPolicy::DropNewest);
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
    }
}
