//! Publish + reference count
//!
//! [`RefCount`] owns at most one live subscription to its source. The first
//! subscriber connects it, later subscribers join the same connection, and
//! the last subscriber to leave disconnects it. A source terminal
//! notification reaches every subscriber and resets the activation, so the
//! next subscriber connects afresh.
//!
//! The subscriber list and connection slot change under one lock, which
//! makes the 0→1 and 1→0 transitions atomic: under any interleaving of
//! subscribe and unsubscribe the source is connected once and disconnected
//! once per hot period. The lock is never held while calling the source or
//! an observer.
//!
//! Live subscribers and the source connection hold the activation strongly,
//! so a subscription outlives every `RefCount` handle that created it.

use crate::error::StreamError;
use crate::stream::{Observable, Observer, Subscriber, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;

struct RefCountState<T> {
    /// Downstream subscribers of the current activation
    subscribers: Vec<(u64, Subscriber<T>)>,

    next_id: u64,

    /// Lifetime of the live source subscription
    connection: Option<Subscription>,

    /// Bumped on every connect; stale connections are ignored
    epoch: u64,
}

struct RefCountInner<T> {
    source: Observable<T>,
    state: Mutex<RefCountState<T>>,
}

/// Shared, reference-counted view of a source stream.
///
/// Clones share the same activation.
pub struct RefCount<T> {
    inner: Arc<RefCountInner<T>>,
}

impl<T> Clone for RefCount<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> RefCount<T> {
    /// Share `source` between all subscribers of this wrapper
    pub fn new(source: Observable<T>) -> Self {
        Self {
            inner: Arc::new(RefCountInner {
                source,
                state: Mutex::new(RefCountState {
                    subscribers: Vec::new(),
                    next_id: 1,
                    connection: None,
                    epoch: 0,
                }),
            }),
        }
    }

    /// Attach a subscriber, connecting the source on 0→1
    pub fn attach(&self, subscriber: Subscriber<T>) {
        let (id, connect) = {
            let mut state = self.inner.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push((id, subscriber.clone()));
            let connect = if state.connection.is_none() {
                state.epoch += 1;
                let connection = Subscription::new();
                state.connection = Some(connection.clone());
                Some((connection, state.epoch))
            } else {
                None
            };
            (id, connect)
        };

        // The subscriber keeps the activation alive, not the stream handle
        let inner = Arc::clone(&self.inner);
        subscriber.add(move || detach(&inner, id));

        if let Some((connection, epoch)) = connect {
            tracing::debug!(epoch, "shared source connecting");
            let fanout = Fanout {
                inner: Arc::clone(&self.inner),
                epoch,
            };
            self.inner
                .source
                .subscribe_with(Subscriber::new(fanout, connection));
        }
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Whether the source is currently connected
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().connection.is_some()
    }

    /// View as a stream
    pub fn observable(&self) -> Observable<T> {
        let shared = self.clone();
        Observable::create(move |subscriber| shared.attach(subscriber))
    }
}

fn detach<T>(inner: &RefCountInner<T>, id: u64) {
    let disconnect = {
        let mut state = inner.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(i, _)| *i != id);
        if before != state.subscribers.len() && state.subscribers.is_empty() {
            state.connection.take()
        } else {
            None
        }
    };
    if let Some(connection) = disconnect {
        tracing::debug!("shared source disconnecting");
        connection.unsubscribe();
    }
}

/// Source observer broadcasting to the current subscribers
struct Fanout<T> {
    inner: Arc<RefCountInner<T>>,
    epoch: u64,
}

impl<T: 'static> Fanout<T> {
    fn live(&self) -> Option<Vec<Subscriber<T>>> {
        let state = self.inner.state.lock();
        if state.epoch != self.epoch || state.connection.is_none() {
            return None;
        }
        let subscribers = state.subscribers.iter().map(|(_, s)| s.clone()).collect();
        Some(subscribers)
    }

    /// End the activation, handing back its subscribers
    fn finish(&self) -> Vec<Subscriber<T>> {
        let mut state = self.inner.state.lock();
        if state.epoch != self.epoch || state.connection.is_none() {
            return Vec::new();
        }
        state.connection = None;
        let subscribers = std::mem::take(&mut state.subscribers);
        subscribers.into_iter().map(|(_, s)| s).collect()
    }
}

impl<T: Clone + Send + 'static> Observer<T> for Fanout<T> {
    fn on_next(&self, value: T) {
        if let Some(subscribers) = self.live() {
            for subscriber in subscribers {
                subscriber.on_next(value.clone());
            }
        }
    }

    fn on_error(&self, error: StreamError) {
        for subscriber in self.finish() {
            subscriber.on_error(error.clone());
        }
    }

    fn on_completed(&self) {
        for subscriber in self.finish() {
            subscriber.on_completed();
        }
    }
}
