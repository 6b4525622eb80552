//! In-process fan-out of new readings to live subscribers.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: a full
//! queue simply misses that event. Dropping a [`Subscription`] removes its
//! queue from the registry, whichever way the consumer went away.

use crate::station::data::ReadingData;
use futures_util::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Queue capacity of every subscriber.
pub const SUBSCRIBER_CAPACITY: usize = 100;

/// Broadcaster of converted readings, as used by the service.
pub type ReadingBroadcaster = Broadcaster<Arc<ReadingData>>;

struct Registry<T> {
    next_id: AtomicU64,
    queues: Mutex<HashMap<u64, mpsc::Sender<T>>>,
}

impl<T> Registry<T> {
    fn queues(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<T>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of one [`Broadcaster::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Single-producer, many-consumer fan-out with drop-on-full backpressure.
pub struct Broadcaster<T> {
    registry: Arc<Registry<T>>,
    capacity: usize,
}

impl<T: Clone> Broadcaster<T> {
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_CAPACITY)
    }

    /// Create a broadcaster whose subscriber queues hold `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(0),
                queues: Mutex::new(HashMap::new()),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber queue.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.queues().insert(id, tx);
        debug!(subscriber = id, "Subscriber registered");

        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Offer `event` to every subscriber without waiting.
    pub fn publish(&self, event: T) -> PublishReport {
        let mut report = PublishReport::default();
        let mut queues = self.registry.queues();

        queues.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                report.dropped += 1;
                debug!(subscriber = id, "Subscriber queue full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        report
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.queues().len()
    }
}

impl<T: Clone> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A live stream of published events for one consumer.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    registry: Arc<Registry<T>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event; `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.registry.queues().remove(&self.id);
        debug!(subscriber = self.id, "Subscriber removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new();
        assert_eq!(broadcaster.publish(1), PublishReport::default());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let broadcaster = Broadcaster::new();
        let mut sub = broadcaster.subscribe();

        for i in 0..5 {
            broadcaster.publish(i);
        }

        let received: Vec<i32> = (&mut sub).take(5).collect().await;
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_only_events_after_subscribe_are_seen() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish("early");

        let mut sub = task::spawn(broadcaster.subscribe());
        assert_pending!(sub.poll_next());

        broadcaster.publish("late");
        assert!(sub.is_woken());
        assert_ready_eq!(sub.poll_next(), Some("late"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let broadcaster = Broadcaster::new();
        let mut slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        for i in 0..SUBSCRIBER_CAPACITY {
            broadcaster.publish(i);
            assert_eq!(fast.recv().await, Some(i));
        }

        let report = broadcaster.publish(SUBSCRIBER_CAPACITY);
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(fast.recv().await, Some(SUBSCRIBER_CAPACITY));

        for i in 0..SUBSCRIBER_CAPACITY {
            assert_eq!(slow.recv().await, Some(i));
        }
        let mut slow = task::spawn(slow);
        assert_pending!(slow.poll_next());
    }

    #[test]
    fn test_drop_deregisters() {
        let broadcaster = Broadcaster::new();
        let first = broadcaster.subscribe();
        let second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(first);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.publish(7u8).delivered, 1);

        drop(second);
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(broadcaster.publish(8u8), PublishReport::default());
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_publish() {
        let broadcaster = Arc::new(Broadcaster::<u64>::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let broadcaster = Arc::clone(&broadcaster);
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let sub = broadcaster.subscribe();
                    tokio::task::yield_now().await;
                    drop(sub);
                }
            }));
        }

        for i in 0..500 {
            broadcaster.publish(i);
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
