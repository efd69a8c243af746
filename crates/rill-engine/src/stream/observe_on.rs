//! Delivering notifications on a scheduler

use crate::error::StreamError;
use crate::scheduler::{Scheduler, Worker};
use crate::stream::observable::Observable;
use crate::stream::observer::{Notification, Observer, Subscriber};
use crate::stream::serial::SerialQueue;
use crate::stream::subscription::Subscription;
use std::sync::Arc;

/// Per-subscription hand-off from the upstream thread to a worker
struct Relay<T> {
    downstream: Subscriber<T>,
    worker: Worker,
    queue: SerialQueue<T>,
}

impl<T: Send + 'static> Relay<T> {
    fn push(self: &Arc<Self>, notification: Notification<T>) {
        if self.queue.push(notification) {
            let relay = Arc::clone(self);
            self.worker
                .schedule(move || relay.queue.drain_into(&relay.downstream));
        }
    }
}

struct RelayObserver<T> {
    relay: Arc<Relay<T>>,
}

impl<T: Send + 'static> Observer<T> for RelayObserver<T> {
    fn on_next(&self, value: T) {
        self.relay.push(Notification::Next(value));
    }

    fn on_error(&self, error: StreamError) {
        self.relay.push(Notification::Error(error));
    }

    fn on_completed(&self) {
        self.relay.push(Notification::Completed);
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Deliver every notification through a worker of `scheduler`.
    ///
    /// Each subscription gets its own worker. Notifications keep their order
    /// on any backend because at most one drain action per subscription is
    /// scheduled at a time. Unsubscribing drops anything not yet delivered.
    pub fn observe_on<S: Scheduler>(&self, scheduler: S) -> Observable<T> {
        let source = self.clone();
        let scheduler = Arc::new(scheduler);
        Observable::create(move |downstream: Subscriber<T>| {
            let worker = scheduler.create_worker(Subscription::new());
            downstream.lifetime().add_child(worker.lifetime());

            let upstream = Subscription::new();
            downstream.lifetime().add_child(&upstream);

            let relay = Arc::new(Relay {
                downstream,
                worker,
                queue: SerialQueue::new(),
            });
            source.subscribe_with(Subscriber::new(RelayObserver { relay }, upstream));
        })
    }
}
