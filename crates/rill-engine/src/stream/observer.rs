//! Observer protocol and the grammar-enforcing subscriber

use crate::error::StreamError;
use crate::stream::subscription::{Subscription, TeardownId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver of stream notifications.
///
/// Calls may arrive on any thread, but a well-formed stream never calls one
/// observer concurrently.
pub trait Observer<T>: Send + Sync + 'static {
    /// A value
    fn on_next(&self, value: T);

    /// Terminal error
    fn on_error(&self, error: StreamError);

    /// Terminal completion
    fn on_completed(&self);
}

/// One stream notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T> {
    /// A value
    Next(T),
    /// Terminal error
    Error(StreamError),
    /// Terminal completion
    Completed,
}

impl<T> Notification<T> {
    /// Whether this notification ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// Deliver to an observer
    pub fn deliver<O: Observer<T> + ?Sized>(self, observer: &O) {
        match self {
            Notification::Next(value) => observer.on_next(value),
            Notification::Error(error) => observer.on_error(error),
            Notification::Completed => observer.on_completed(),
        }
    }
}

/// Observer built from a single notification callback
pub struct FnObserver<F> {
    f: F,
}

impl<F> FnObserver<F> {
    /// Wrap a callback
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Observer<T> for FnObserver<F>
where
    F: Fn(Notification<T>) + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        (self.f)(Notification::Next(value))
    }

    fn on_error(&self, error: StreamError) {
        (self.f)(Notification::Error(error))
    }

    fn on_completed(&self) {
        (self.f)(Notification::Completed)
    }
}

struct SubscriberInner<T> {
    observer: Box<dyn Observer<T>>,
    lifetime: Subscription,
    stopped: AtomicBool,
}

/// An observer bound to a lifetime.
///
/// Enforces the stream grammar on behalf of its observer: values are dropped
/// once the lifetime ends or a terminal notification was delivered, at most
/// one terminal notification gets through, and delivering it ends the
/// lifetime.
pub struct Subscriber<T> {
    inner: Arc<SubscriberInner<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Subscriber<T> {
    /// Bind an observer to a lifetime
    pub fn new<O: Observer<T>>(observer: O, lifetime: Subscription) -> Self {
        Self {
            inner: Arc::new(SubscriberInner {
                observer: Box::new(observer),
                lifetime,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// The subscriber's lifetime
    pub fn lifetime(&self) -> &Subscription {
        &self.inner.lifetime
    }

    /// Whether notifications are still wanted
    pub fn is_subscribed(&self) -> bool {
        !self.inner.stopped.load(Ordering::Acquire) && self.inner.lifetime.is_subscribed()
    }

    /// Register a teardown on the subscriber's lifetime
    pub fn add<F>(&self, teardown: F) -> Option<TeardownId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.lifetime.add(teardown)
    }

    /// Deliver a value
    pub fn on_next(&self, value: T) {
        if self.is_subscribed() {
            self.inner.observer.on_next(value);
        }
    }

    /// Deliver a terminal error
    pub fn on_error(&self, error: StreamError) {
        if self.begin_terminal() {
            self.inner.observer.on_error(error);
            self.inner.lifetime.unsubscribe();
        }
    }

    /// Deliver terminal completion
    pub fn on_completed(&self) {
        if self.begin_terminal() {
            self.inner.observer.on_completed();
            self.inner.lifetime.unsubscribe();
        }
    }

    /// Deliver any notification
    pub fn notify(&self, notification: Notification<T>) {
        match notification {
            Notification::Next(value) => self.on_next(value),
            Notification::Error(error) => self.on_error(error),
            Notification::Completed => self.on_completed(),
        }
    }

    fn begin_terminal(&self) -> bool {
        !self.inner.stopped.swap(true, Ordering::AcqRel) && self.inner.lifetime.is_subscribed()
    }
}

impl<T: Send + 'static> Observer<T> for Subscriber<T> {
    fn on_next(&self, value: T) {
        Subscriber::on_next(self, value)
    }

    fn on_error(&self, error: StreamError) {
        Subscriber::on_error(self, error)
    }

    fn on_completed(&self) {
        Subscriber::on_completed(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording() -> (Subscriber<i32>, Arc<Mutex<Vec<Notification<i32>>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let subscriber = Subscriber::new(
            FnObserver::new(move |n: Notification<i32>| l.lock().push(n)),
            Subscription::new(),
        );
        (subscriber, log)
    }

    #[test]
    fn test_no_values_after_completion() {
        let (subscriber, log) = recording();
        subscriber.on_next(1);
        subscriber.on_completed();
        subscriber.on_next(2);
        subscriber.on_error(StreamError::from("late"));

        assert_eq!(
            *log.lock(),
            vec![Notification::Next(1), Notification::Completed]
        );
        assert!(!subscriber.lifetime().is_subscribed());
    }

    #[test]
    fn test_error_ends_lifetime() {
        let (subscriber, log) = recording();
        subscriber.on_error(StreamError::from("boom"));
        subscriber.on_completed();

        assert_eq!(
            *log.lock(),
            vec![Notification::Error(StreamError::Other("boom".into()))]
        );
        assert!(!subscriber.is_subscribed());
    }

    #[test]
    fn test_unsubscribed_lifetime_drops_everything() {
        let (subscriber, log) = recording();
        subscriber.lifetime().unsubscribe();
        subscriber.on_next(1);
        subscriber.on_completed();
        assert!(log.lock().is_empty());
    }
}
