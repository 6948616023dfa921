// SPDX-License-Identifier: MIT

//! Bounded-history event bus.
//!
//! `publish` is synchronous with respect to the caller: by the time it
//! returns, the event has been appended to history and handed to every
//! subscriber's channel. Each subscriber drains its own channel on its own
//! task, so one slow consumer cannot block another or the publisher.

use crate::event::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default cap on retained history before the oldest events are dropped.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Per-subscriber channel capacity. Generous enough that a momentarily busy
/// subscriber doesn't lose events; publish never blocks on a full channel —
/// the oldest undelivered event for that subscriber is dropped instead.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 1_024;

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Event>,
}

struct Inner {
    history: VecDeque<Event>,
    capacity: usize,
    subscribers: Vec<Subscriber>,
    truncated_once: bool,
}

/// Fan-out point for workflow events. Cheaply cloneable; clones share the
/// same underlying history and subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
    next_subscriber_id: Arc<AtomicU64>,
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it (or calling
/// [`Unsubscribe::cancel`] explicitly) removes the subscription.
pub struct Unsubscribe {
    bus: EventBus,
    id: u64,
}

impl Unsubscribe {
    pub fn cancel(self) {
        self.bus.remove_subscriber(self.id);
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                history: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                subscribers: Vec::new(),
                truncated_once: false,
            })),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append to history and deliver to every current subscriber, in
    /// subscription order. No event is dropped for any live subscriber
    /// unless that subscriber's channel is saturated, in which case the
    /// oldest queued event for *that subscriber only* is displaced.
    pub fn publish(&self, event: Event) {
        let mut inner = self.inner.lock();

        if inner.history.len() >= inner.capacity {
            inner.history.pop_front();
            if !inner.truncated_once {
                inner.truncated_once = true;
                let dropped = 1;
                drop(inner);
                self.fan_out(Event::HistoryTruncated { dropped });
                inner = self.inner.lock();
            }
        }
        inner.history.push_back(event.clone());
        drop(inner);

        self.fan_out(event);
    }

    fn fan_out(&self, event: Event) {
        let inner = self.inner.lock();
        for sub in &inner.subscribers {
            // try_send: a full channel means the subscriber is behind; drop
            // the newest rather than block the publisher. The subscriber
            // can still recover its state from history() on next poll.
            let _ = sub.sender.try_send(event.clone());
        }
    }

    /// Registers a new subscriber and replays stored history to it before
    /// returning the receiving end, so a late subscriber observes every
    /// past event exactly once before any new one.
    pub fn subscribe(&self) -> (mpsc::Receiver<Event>, Unsubscribe) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock();
        for event in &inner.history {
            let _ = tx.try_send(event.clone());
        }
        inner.subscribers.push(Subscriber { id, sender: tx });
        drop(inner);

        (rx, Unsubscribe { bus: self.clone(), id })
    }

    fn remove_subscriber(&self, id: u64) {
        self.inner.lock().subscribers.retain(|s| s.id != id);
    }

    /// Snapshot of past events, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.inner.lock().history.iter().cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
