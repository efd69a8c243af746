//! Lazy push producer

use crate::error::StreamError;
use crate::stream::observer::{FnObserver, Notification, Observer, Subscriber};
use crate::stream::subscription::Subscription;
use std::sync::Arc;

type SubscribeFn<T> = dyn Fn(Subscriber<T>) + Send + Sync + 'static;

/// A lazy stream: nothing happens until it is subscribed.
///
/// Each subscription runs the producer function with a fresh
/// [`Subscriber`]. Clones share the producer.
pub struct Observable<T> {
    on_subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: Arc::clone(&self.on_subscribe),
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build a stream from a producer function
    pub fn create<F>(on_subscribe: F) -> Self
    where
        F: Fn(Subscriber<T>) + Send + Sync + 'static,
    {
        Self {
            on_subscribe: Arc::new(on_subscribe),
        }
    }

    /// Build a fresh stream from `factory` for every subscription
    pub fn defer<F>(factory: F) -> Self
    where
        F: Fn() -> Observable<T> + Send + Sync + 'static,
    {
        Self::create(move |subscriber| factory().subscribe_with(subscriber))
    }

    /// A stream that completes immediately
    pub fn empty() -> Self {
        Self::create(|subscriber| subscriber.on_completed())
    }

    /// A stream that fails immediately
    pub fn error(error: StreamError) -> Self {
        Self::create(move |subscriber| subscriber.on_error(error.clone()))
    }

    /// Subscribe an observer; the returned lifetime cancels the subscription
    pub fn subscribe<O: Observer<T>>(&self, observer: O) -> Subscription {
        let lifetime = Subscription::new();
        self.subscribe_with(Subscriber::new(observer, lifetime.clone()));
        lifetime
    }

    /// Subscribe a notification callback
    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn(Notification<T>) + Send + Sync + 'static,
    {
        self.subscribe(FnObserver::new(f))
    }

    /// Subscribe an existing subscriber, keeping its lifetime
    pub fn subscribe_with(&self, subscriber: Subscriber<T>) {
        if subscriber.is_subscribed() {
            (self.on_subscribe)(subscriber);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// A stream that emits one value then completes
    pub fn just(value: T) -> Self {
        Self::create(move |subscriber| {
            subscriber.on_next(value.clone());
            subscriber.on_completed();
        })
    }
}
