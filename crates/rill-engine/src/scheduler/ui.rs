//! Scheduler over a single serialized dispatch queue
//!
//! Immediate work is posted to the queue, so actions run one at a time in
//! submission order. Delayed work arms a one-shot timer bound to the same
//! queue; the tick stops the timer and posts the action through the
//! immediate path. Recursion is disabled: a repeat requested by a running
//! action is always posted back to the queue rather than run inline.

use crate::error::{ConfigError, ConfigResult};
use crate::scheduler::schedulable::Schedulable;
use crate::scheduler::worker::{resubmit, Scheduler, Worker, WorkerBackend};
use crate::stream::Subscription;
use parking_lot::Mutex;
use rill_sdk::{DispatchPriority, DispatchQueue, TimerHandle};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Instant;

thread_local! {
    static CURRENT_QUEUE: RefCell<Option<Arc<dyn DispatchQueue>>> = const { RefCell::new(None) };
}

/// Make `queue` the current dispatch queue of the calling thread.
///
/// The previous queue is restored when the guard drops.
pub fn install_current_queue(queue: Arc<dyn DispatchQueue>) -> CurrentQueueGuard {
    let previous = CURRENT_QUEUE.with(|current| current.borrow_mut().replace(queue));
    CurrentQueueGuard { previous }
}

/// The calling thread's current dispatch queue
pub fn current_queue() -> Option<Arc<dyn DispatchQueue>> {
    CURRENT_QUEUE.with(|current| current.borrow().clone())
}

/// Restores the previous current queue on drop
#[must_use = "the queue stops being current when the guard drops"]
pub struct CurrentQueueGuard {
    previous: Option<Arc<dyn DispatchQueue>>,
}

impl Drop for CurrentQueueGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_QUEUE.with(|current| *current.borrow_mut() = previous);
    }
}

/// Scheduler bound to a serialized dispatch queue
#[derive(Clone)]
pub struct UiScheduler {
    backend: Arc<UiBackend>,
}

impl UiScheduler {
    /// Schedule onto `queue` at normal priority
    pub fn new(queue: Arc<dyn DispatchQueue>) -> Self {
        Self::with_priority(queue, DispatchPriority::Normal)
    }

    /// Schedule onto `queue` at `priority`
    pub fn with_priority(queue: Arc<dyn DispatchQueue>, priority: DispatchPriority) -> Self {
        Self {
            backend: Arc::new(UiBackend { queue, priority }),
        }
    }

    /// Schedule onto the calling thread's current queue
    ///
    /// Fails immediately when the thread has no dispatch queue.
    pub fn current() -> ConfigResult<Self> {
        Self::current_with_priority(DispatchPriority::Normal)
    }

    /// Like [`UiScheduler::current`] with an explicit priority
    pub fn current_with_priority(priority: DispatchPriority) -> ConfigResult<Self> {
        current_queue()
            .map(|queue| Self::with_priority(queue, priority))
            .ok_or(ConfigError::NoDispatcher)
    }

    /// Priority used for every post
    pub fn priority(&self) -> DispatchPriority {
        self.backend.priority
    }
}

impl Scheduler for UiScheduler {
    fn create_worker(&self, lifetime: Subscription) -> Worker {
        Worker::new(lifetime, self.backend.clone())
    }
}

#[derive(Clone)]
struct UiBackend {
    queue: Arc<dyn DispatchQueue>,
    priority: DispatchPriority,
}

impl UiBackend {
    fn execute(&self, item: Schedulable) {
        let request = item.run(false);
        resubmit(self, item, request);
    }
}

impl WorkerBackend for UiBackend {
    fn schedule_now(&self, item: Schedulable) {
        let this = self.clone();
        let posted = item.clone();
        if let Err(e) = self
            .queue
            .post(self.priority, Box::new(move || this.execute(posted)))
        {
            tracing::warn!(error = %e, "dispatch queue rejected scheduled action");
            item.cancel();
        }
    }

    fn schedule_at(&self, due: Instant, item: Schedulable) {
        let interval = due.saturating_duration_since(Instant::now());
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

        let this = self.clone();
        let tick_slot = slot.clone();
        let tick_item = item.clone();
        let tick = Box::new(move || {
            stop_quietly(&tick_slot);
            this.schedule_now(tick_item);
        });

        match self.queue.start_timer(interval, tick) {
            Ok(timer) => {
                tracing::trace!(?interval, "dispatch timer armed");
                *slot.lock() = Some(timer);
                item.lifetime().add(move || stop_quietly(&slot));
            }
            Err(e) => {
                tracing::warn!(error = %e, "dispatch queue rejected timer");
                item.cancel();
            }
        }
    }
}

/// Stop and release a timer, discarding failures
pub(crate) fn stop_quietly(slot: &Mutex<Option<TimerHandle>>) {
    let timer = slot.lock().take();
    if let Some(timer) = timer {
        if let Err(e) = timer.stop() {
            tracing::warn!(error = %e, "failed to stop timer; discarding");
        }
    }
}
