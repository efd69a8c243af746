//! Replay-last broadcast channel
//!
//! Caches the most recent value and the terminal notification. A subscriber
//! attaching mid-flight receives the cached value and then live values; one
//! attaching after termination receives the cached value (if any) and then
//! the cached terminal notification.
//!
//! Producers write from whatever thread the upstream callback runs on, while
//! subscribers attach from arbitrary threads. Every subscriber sits behind
//! its own [`SerialQueue`]: the replay is queued under the same lock that
//! queues live values, so a late subscriber never sees a live value ahead
//! of its replayed one. No lock is held while observers run, so attaching
//! never waits on another subscriber's callback.

use crate::error::StreamError;
use crate::stream::{Notification, Observable, SerialQueue, Subscriber};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Cached terminal notification
#[derive(Clone)]
enum Terminal {
    Completed,
    Error(StreamError),
}

impl Terminal {
    fn notification<T>(self) -> Notification<T> {
        match self {
            Terminal::Completed => Notification::Completed,
            Terminal::Error(error) => Notification::Error(error),
        }
    }
}

/// One attached subscriber and its delivery queue
struct Slot<T> {
    subscriber: Subscriber<T>,
    queue: SerialQueue<T>,
}

impl<T: 'static> Slot<T> {
    fn drain(&self) {
        self.queue.drain_into(&self.subscriber);
    }
}

struct ReplayState<T> {
    /// Most recent value
    last: Option<T>,

    /// Terminal notification, once received
    terminal: Option<Terminal>,

    /// Live subscribers
    slots: Vec<(u64, Arc<Slot<T>>)>,

    next_id: u64,
}

/// Broadcast channel with replay-last semantics.
///
/// Clones share the same channel.
pub struct ReplayLast<T> {
    state: Arc<Mutex<ReplayState<T>>>,
}

impl<T> Clone for ReplayLast<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> Default for ReplayLast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ReplayLast<T> {
    /// Create an empty, unterminated channel
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ReplayState {
                last: None,
                terminal: None,
                slots: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Attach a subscriber, replaying the cache first
    pub fn attach(&self, subscriber: Subscriber<T>) {
        let slot = Arc::new(Slot {
            subscriber,
            queue: SerialQueue::new(),
        });

        let id = {
            let mut state = self.state.lock();
            if let Some(value) = state.last.clone() {
                slot.queue.push(Notification::Next(value));
            }
            match state.terminal.clone() {
                Some(terminal) => {
                    slot.queue.push(terminal.notification());
                    None
                }
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.slots.push((id, slot.clone()));
                    Some(id)
                }
            }
        };

        if let Some(id) = id {
            let weak: Weak<Mutex<ReplayState<T>>> = Arc::downgrade(&self.state);
            slot.subscriber.add(move || {
                if let Some(state) = weak.upgrade() {
                    state.lock().slots.retain(|(i, _)| *i != id);
                }
            });
        }
        slot.drain();
    }

    /// Cache and broadcast a value; ignored after termination
    pub fn emit(&self, value: T) {
        self.publish(Some(value), None);
    }

    /// Terminate with completion
    pub fn complete(&self) {
        self.publish(None, Some(Terminal::Completed));
    }

    /// Terminate with an error
    pub fn error(&self, error: StreamError) {
        self.publish(None, Some(Terminal::Error(error)));
    }

    /// Emit a value, then complete
    pub fn complete_with(&self, value: T) {
        self.publish(Some(value), Some(Terminal::Completed));
    }

    /// Most recent value
    pub fn last(&self) -> Option<T> {
        self.state.lock().last.clone()
    }

    /// Whether a terminal notification has been received
    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// View the channel as a stream; each subscription attaches a subscriber
    pub fn observable(&self) -> Observable<T> {
        let channel = self.clone();
        Observable::create(move |subscriber| channel.attach(subscriber))
    }

    /// Queue a value and/or terminal on every slot, then drain the idle ones
    fn publish(&self, value: Option<T>, terminal: Option<Terminal>) {
        let ready = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            if let Some(value) = &value {
                state.last = Some(value.clone());
            }
            let slots = match &terminal {
                Some(terminal) => {
                    state.terminal = Some(terminal.clone());
                    std::mem::take(&mut state.slots)
                }
                None => state.slots.clone(),
            };

            let mut ready = Vec::new();
            for (_, slot) in slots {
                let mut claimed = false;
                if let Some(value) = &value {
                    claimed |= slot.queue.push(Notification::Next(value.clone()));
                }
                if let Some(terminal) = &terminal {
                    claimed |= slot.queue.push(terminal.clone().notification());
                }
                if claimed {
                    ready.push(slot);
                }
            }
            ready
        };

        for slot in ready {
            slot.drain();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Subscription;

    type Log = Arc<Mutex<Vec<Notification<i32>>>>;

    fn attach(channel: &ReplayLast<i32>) -> (Log, Subscription) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let lifetime = channel.observable().subscribe_fn(move |n| l.lock().push(n));
        (log, lifetime)
    }

    #[test]
    fn test_late_subscriber_gets_last_value_only() {
        let channel = ReplayLast::new();
        channel.emit(10);
        channel.emit(50);

        let (log, _lifetime) = attach(&channel);
        channel.emit(90);

        assert_eq!(
            *log.lock(),
            vec![Notification::Next(50), Notification::Next(90)]
        );
    }

    #[test]
    fn test_subscriber_after_termination_gets_cache() {
        let channel = ReplayLast::new();
        channel.complete_with(7);

        let (log, lifetime) = attach(&channel);
        assert_eq!(
            *log.lock(),
            vec![Notification::Next(7), Notification::Completed]
        );
        assert!(!lifetime.is_subscribed());
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_error_is_replayed() {
        let channel: ReplayLast<i32> = ReplayLast::new();
        channel.error(StreamError::from("failed"));
        channel.emit(1);

        let (log, _lifetime) = attach(&channel);
        assert_eq!(
            *log.lock(),
            vec![Notification::Error(StreamError::Other("failed".into()))]
        );
        assert_eq!(channel.last(), None);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let channel = ReplayLast::new();
        let (log, lifetime) = attach(&channel);
        assert_eq!(channel.subscriber_count(), 1);

        lifetime.unsubscribe();
        assert_eq!(channel.subscriber_count(), 0);
        channel.emit(3);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_reentrant_subscribe_from_notification() {
        let channel = ReplayLast::new();
        let inner_log: Log = Arc::new(Mutex::new(Vec::new()));

        let c = channel.clone();
        let il = inner_log.clone();
        let _outer = channel.observable().subscribe_fn(move |n| {
            if n == Notification::Next(1) {
                let il = il.clone();
                c.observable().subscribe_fn(move |n| il.lock().push(n));
            }
        });
        channel.emit(1);
        channel.emit(2);

        assert_eq!(
            *inner_log.lock(),
            vec![Notification::Next(1), Notification::Next(2)]
        );
    }

    #[test]
    fn test_emit_from_callback_is_queued_behind_current() {
        let channel = ReplayLast::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let (c, l) = (channel.clone(), log.clone());
        let _lifetime = channel.observable().subscribe_fn(move |n| {
            if n == Notification::Next(1) {
                c.emit(2);
                assert_eq!(*l.lock(), Vec::new());
            }
            l.lock().push(n);
        });
        channel.emit(1);

        assert_eq!(
            *log.lock(),
            vec![Notification::Next(1), Notification::Next(2)]
        );
        assert_eq!(channel.last(), Some(2));
    }
}
