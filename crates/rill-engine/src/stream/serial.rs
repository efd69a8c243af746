//! Per-subscriber serialized delivery
//!
//! Any thread may push notifications; exactly one thread at a time drains
//! them, in push order. The thread whose push finds the queue idle becomes
//! the drainer, every other pusher returns without waiting. No lock is held
//! while the subscriber runs, so a callback may push to its own queue or
//! subscribe elsewhere without deadlocking.

use crate::stream::observer::{Notification, Subscriber};
use parking_lot::Mutex;
use std::collections::VecDeque;

struct SerialState<T> {
    pending: VecDeque<Notification<T>>,
    /// Whether some thread owns the drain
    draining: bool,
}

/// Ordered hand-off queue in front of one subscriber
pub(crate) struct SerialQueue<T> {
    state: Mutex<SerialState<T>>,
}

impl<T: 'static> SerialQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SerialState {
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    /// Queue a notification; returns true when the caller must drain
    pub(crate) fn push(&self, notification: Notification<T>) -> bool {
        let mut state = self.state.lock();
        state.pending.push_back(notification);
        if state.draining {
            return false;
        }
        state.draining = true;
        true
    }

    /// Next queued notification; None releases the drain
    pub(crate) fn next(&self) -> Option<Notification<T>> {
        let mut state = self.state.lock();
        let next = state.pending.pop_front();
        if next.is_none() {
            state.draining = false;
        }
        next
    }

    /// Deliver everything queued, including items pushed while delivering
    pub(crate) fn drain_into(&self, subscriber: &Subscriber<T>) {
        while let Some(notification) = self.next() {
            subscriber.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{FnObserver, Subscription};
    use std::sync::Arc;

    #[test]
    fn test_only_first_push_claims_drain() {
        let queue: SerialQueue<i32> = SerialQueue::new();
        assert!(queue.push(Notification::Next(1)));
        assert!(!queue.push(Notification::Next(2)));

        assert_eq!(queue.next(), Some(Notification::Next(1)));
        assert_eq!(queue.next(), Some(Notification::Next(2)));
        assert_eq!(queue.next(), None);
        assert!(queue.push(Notification::Completed));
    }

    #[test]
    fn test_push_from_callback_is_delivered_in_order() {
        let queue = Arc::new(SerialQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let (q, l) = (queue.clone(), log.clone());
        let subscriber = Subscriber::new(
            FnObserver::new(move |n: Notification<i32>| {
                if n == Notification::Next(1) {
                    assert!(!q.push(Notification::Next(2)));
                }
                l.lock().push(n);
            }),
            Subscription::new(),
        );

        assert!(queue.push(Notification::Next(1)));
        queue.drain_into(&subscriber);
        assert_eq!(
            *log.lock(),
            vec![Notification::Next(1), Notification::Next(2)]
        );
    }
}
