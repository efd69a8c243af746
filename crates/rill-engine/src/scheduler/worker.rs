//! Worker and scheduler contracts
//!
//! A [`Worker`] is one logical execution context. Every action scheduled on
//! it becomes a [`Schedulable`] whose lifetime is a child of the worker's,
//! so unsubscribing the worker cancels everything still pending on it.
//! Backends implement [`WorkerBackend`]; nothing above this layer knows
//! which backend it runs on.

use crate::scheduler::schedulable::{Action, Recurse, Reschedule, Schedulable};
use crate::stream::Subscription;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Due times closer than this run immediately instead of arming a timer
pub const MIN_TIMER_DELAY: Duration = Duration::from_millis(10);

/// Whether a due time is past or within [`MIN_TIMER_DELAY`] of `now`
pub fn due_soon(due: Instant, now: Instant) -> bool {
    due <= now || due - now < MIN_TIMER_DELAY
}

/// Execution backend behind a [`Worker`]
pub trait WorkerBackend: Send + Sync + 'static {
    /// Run the item as soon as the backend admits it
    fn schedule_now(&self, item: Schedulable);

    /// Run the item no earlier than `due`
    fn schedule_at(&self, due: Instant, item: Schedulable);
}

/// Factory of workers over one backend
pub trait Scheduler: Send + Sync + 'static {
    /// Create a worker bound to `lifetime`
    fn create_worker(&self, lifetime: Subscription) -> Worker;

    /// The scheduler's clock
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Handle for scheduling actions on one execution context.
///
/// Clones share the same lifetime and backend.
#[derive(Clone)]
pub struct Worker {
    lifetime: Subscription,
    backend: Arc<dyn WorkerBackend>,
}

impl Worker {
    /// Bind a backend to a lifetime
    pub fn new(lifetime: Subscription, backend: Arc<dyn WorkerBackend>) -> Self {
        Self { lifetime, backend }
    }

    /// The worker's lifetime
    pub fn lifetime(&self) -> &Subscription {
        &self.lifetime
    }

    /// Whether the worker still accepts work
    pub fn is_subscribed(&self) -> bool {
        self.lifetime.is_subscribed()
    }

    /// Cancel everything pending on this worker
    pub fn unsubscribe(&self) {
        self.lifetime.unsubscribe();
    }

    /// Run `action` as soon as possible; the result cancels it
    pub fn schedule<F>(&self, action: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_recursive(once(action))
    }

    /// Run `action` no earlier than `due`
    pub fn schedule_at<F>(&self, due: Instant, action: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_recursive_at(due, once(action))
    }

    /// Run `action` after `delay`
    pub fn schedule_after<F>(&self, delay: Duration, action: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, action)
    }

    /// Run an action that may ask to run again through its [`Recurse`] token
    pub fn schedule_recursive<F>(&self, action: F) -> Subscription
    where
        F: FnMut(&mut Recurse) + Send + 'static,
    {
        match self.wrap(Box::new(action)) {
            Some(item) => {
                let lifetime = item.lifetime().clone();
                self.backend.schedule_now(item);
                lifetime
            }
            None => Subscription::closed(),
        }
    }

    /// Like [`Worker::schedule_recursive`], first run no earlier than `due`
    pub fn schedule_recursive_at<F>(&self, due: Instant, action: F) -> Subscription
    where
        F: FnMut(&mut Recurse) + Send + 'static,
    {
        match self.wrap(Box::new(action)) {
            Some(item) => {
                let lifetime = item.lifetime().clone();
                if due_soon(due, Instant::now()) {
                    tracing::trace!("due time within minimum timer delay; scheduling now");
                    self.backend.schedule_now(item);
                } else {
                    self.backend.schedule_at(due, item);
                }
                lifetime
            }
            None => Subscription::closed(),
        }
    }

    fn wrap(&self, action: Action) -> Option<Schedulable> {
        if !self.lifetime.is_subscribed() {
            return None;
        }
        let lifetime = Subscription::new();
        self.lifetime.add_child(&lifetime);
        Some(Schedulable::new(lifetime, action))
    }
}

/// Adapt a one-shot closure to the recursive action shape
fn once<F>(action: F) -> impl FnMut(&mut Recurse) + Send + 'static
where
    F: FnOnce() + Send + 'static,
{
    let mut action = Some(action);
    move |_: &mut Recurse| {
        if let Some(action) = action.take() {
            action();
        }
    }
}

/// Hand a repeat requested by a finished run back to its backend
pub(crate) fn resubmit<B: WorkerBackend + ?Sized>(
    backend: &B,
    item: Schedulable,
    request: Option<Reschedule>,
) {
    match request {
        None => {}
        Some(Reschedule::Now) => backend.schedule_now(item),
        Some(Reschedule::At(due)) if due_soon(due, Instant::now()) => backend.schedule_now(item),
        Some(Reschedule::At(due)) => backend.schedule_at(due, item),
    }
}
