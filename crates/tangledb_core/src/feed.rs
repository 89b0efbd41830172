//! Change notifications for committed record operations.
//!
//! Every successful add, delete, or erase emits one [`MessageEvent`] to all
//! live subscribers. Subscribers receive events through a standard mpsc
//! channel; dropping the receiver unsubscribes on the next emit.

use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};

/// The kind of record operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A message was admitted and appended.
    Added,
    /// A message's log slot was tombstoned.
    Deleted,
    /// A message's payload was blanked in place.
    Erased,
}

/// A committed record operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// Id of the affected message.
    pub id: String,
    /// What happened to it.
    pub kind: EventKind,
}

/// Distributes committed operations to any number of subscribers.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<MessageEvent>>>,
    next_seq: Mutex<u64>,
}

impl ChangeFeed {
    /// Creates a feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_seq: Mutex::new(1),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<MessageEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers, pruning disconnected ones.
    pub fn emit(&self, id: &str, kind: EventKind) {
        let seq = {
            let mut next = self.next_seq.lock();
            let seq = *next;
            *next += 1;
            seq
        };
        let event = MessageEvent {
            seq,
            id: id.to_string(),
            kind,
        };
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_all_subscribers_in_order() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        feed.emit("m1", EventKind::Added);
        feed.emit("m1", EventKind::Erased);

        for rx in [&rx1, &rx2] {
            let first = rx.try_recv().unwrap();
            assert_eq!(first.seq, 1);
            assert_eq!(first.kind, EventKind::Added);
            let second = rx.try_recv().unwrap();
            assert_eq!(second.seq, 2);
            assert_eq!(second.kind, EventKind::Erased);
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit("m1", EventKind::Deleted);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        let feed = ChangeFeed::new();
        feed.emit("m1", EventKind::Added);

        let rx = feed.subscribe();
        feed.emit("m2", EventKind::Added);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.id, "m2");
        assert_eq!(event.seq, 2);
    }
}
