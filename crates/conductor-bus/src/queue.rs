//! Bounded per-observer delivery queue with drop-oldest back-pressure for
//! non-critical events (§5). A plain `tokio::mpsc` channel blocks the
//! publisher when full, which is the wrong trade-off here — the core must
//! never stall waiting on a slow observer — so this is a small hand-rolled
//! ring buffer guarded by a `Notify`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::observer::BusEvent;

pub(crate) struct ObserverQueue {
    inner: Mutex<VecDeque<BusEvent>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
}

impl ObserverQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, event: BusEvent) {
        {
            let mut guard = self.inner.lock().expect("observer queue mutex poisoned");
            if guard.len() >= self.capacity {
                if let Some(pos) = guard.iter().position(|e| !e.is_critical()) {
                    guard.remove(pos);
                }
                // If every queued event is critical the queue grows past
                // capacity transiently rather than dropping one — critical
                // events are never discarded.
            }
            guard.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Signal no more events will be pushed; wakes a waiting `pop` so it can
    /// drain the remainder and return `None`.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub(crate) async fn pop(&self) -> Option<BusEvent> {
        loop {
            if let Some(event) = self.inner.lock().expect("observer queue mutex poisoned").pop_front() {
                return Some(event);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::types::{ProgressEvent, ProgressStage, StreamingChunk};

    #[tokio::test]
    async fn drops_oldest_non_critical_under_pressure() {
        let queue = ObserverQueue::new(2);
        queue.push(BusEvent::Progress(ProgressEvent::new(ProgressStage::Searching, "a")));
        queue.push(BusEvent::Progress(ProgressEvent::new(ProgressStage::Searching, "b")));
        queue.push(BusEvent::Progress(ProgressEvent::new(ProgressStage::Searching, "c")));
        let first = queue.pop().await.unwrap();
        match first {
            BusEvent::Progress(p) => assert_eq!(p.message, "b"),
            _ => panic!("expected progress event"),
        }
    }

    #[tokio::test]
    async fn critical_events_are_never_dropped() {
        let queue = ObserverQueue::new(1);
        queue.push(BusEvent::StreamingChunk(StreamingChunk {
            content: "a".into(),
            is_final: true,
        }));
        queue.push(BusEvent::StreamingComplete);
        let first = queue.pop().await.unwrap();
        assert!(matches!(first, BusEvent::StreamingChunk(_)));
        let second = queue.pop().await.unwrap();
        assert!(matches!(second, BusEvent::StreamingComplete));
    }

    #[tokio::test]
    async fn close_drains_then_returns_none() {
        let queue = ObserverQueue::new(4);
        queue.push(BusEvent::StreamingComplete);
        queue.close();
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }
}
