//! Client sessions and their bounded outbound queues

use crate::ServerEvent;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::Notify;
use tracking_model::Principal;
use uuid::Uuid;

/// Bounded FIFO of outbound events.
///
/// `push` never blocks: at capacity the oldest event is dropped and the
/// drop counter incremented. The session's writer task drains with `recv`.
pub(crate) struct SessionQueue {
    capacity: usize,
    events: Mutex<VecDeque<ServerEvent>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl SessionQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, event: ServerEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut events = self.events.lock().expect("session queue lock poisoned");
            if events.len() >= self.capacity {
                events.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            events.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Next event in FIFO order; `None` once the queue is closed and drained.
    pub(crate) async fn recv(&self) -> Option<ServerEvent> {
        loop {
            if let Some(event) = self
                .events
                .lock()
                .expect("session queue lock poisoned")
                .pop_front()
            {
                return Some(event);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// One connected push-channel client.
pub struct Session {
    pub id: Uuid,
    pub principal: Option<Principal>,
    pub(crate) queue: SessionQueue,
    pub(crate) rooms: Mutex<HashSet<String>>,
    pub(crate) last_seen: Mutex<Instant>,
}

impl Session {
    pub(crate) fn new(principal: Option<Principal>, queue_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal,
            queue: SessionQueue::new(queue_capacity),
            rooms: Mutex::new(HashSet::new()),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Await the next outbound event. `None` after the session closes.
    pub async fn next_event(&self) -> Option<ServerEvent> {
        self.queue.recv().await
    }

    /// Enqueue an event directly to this session (e.g. a `pong` reply).
    /// Subject to the same bounded-queue overflow policy as room publishes.
    pub fn send(&self, event: ServerEvent) {
        self.queue.push(event);
    }

    /// Events dropped from this session's queue due to overflow.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Record client liveness (any received frame counts).
    pub fn mark_seen(&self, now: Instant) {
        *self.last_seen.lock().expect("session lock poisoned") = now;
    }

    pub(crate) fn seen_at(&self) -> Instant {
        *self.last_seen.lock().expect("session lock poisoned")
    }

    /// Rooms this session is currently a member of.
    pub fn room_names(&self) -> Vec<String> {
        self.rooms
            .lock()
            .expect("session lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_preserves_fifo_order() {
        let queue = SessionQueue::new(8);
        queue.push(ServerEvent::Pong);
        queue.push(ServerEvent::SessionClosed {
            reason: "a".to_string(),
        });

        assert_eq!(queue.recv().await, Some(ServerEvent::Pong));
        assert_eq!(
            queue.recv().await,
            Some(ServerEvent::SessionClosed {
                reason: "a".to_string()
            })
        );
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let queue = SessionQueue::new(2);
        for reason in ["one", "two", "three"] {
            queue.push(ServerEvent::SessionClosed {
                reason: reason.to_string(),
            });
        }

        assert_eq!(queue.dropped(), 1);
        // "one" was sacrificed; "two" survives at the front.
        assert_eq!(
            queue.recv().await,
            Some(ServerEvent::SessionClosed {
                reason: "two".to_string()
            })
        );
    }

    #[tokio::test]
    async fn recv_returns_none_after_close() {
        let queue = SessionQueue::new(2);
        queue.push(ServerEvent::Pong);
        queue.close();

        // Already-queued events still drain before the terminal None.
        assert_eq!(queue.recv().await, Some(ServerEvent::Pong));
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn push_after_close_is_ignored() {
        let queue = SessionQueue::new(2);
        queue.close();
        queue.push(ServerEvent::Pong);
        assert_eq!(queue.recv().await, None);
    }
}
