//! Scheduler over a shared thread pool
//!
//! Immediate work is queued on the pool with no ordering between actions.
//! Delayed work uses the pool's own cancellable timer. Recursion is allowed:
//! an immediate repeat runs inline on the worker thread that is already
//! executing the action.

use crate::scheduler::schedulable::Schedulable;
use crate::scheduler::ui::stop_quietly;
use crate::scheduler::worker::{resubmit, Scheduler, Worker, WorkerBackend};
use crate::stream::Subscription;
use parking_lot::Mutex;
use rill_sdk::{ThreadPool, TimerHandle, WorkPriority};
use std::sync::Arc;
use std::time::Instant;

/// Scheduler bound to a thread pool
#[derive(Clone)]
pub struct PoolScheduler {
    backend: Arc<PoolBackend>,
}

impl PoolScheduler {
    /// Schedule onto `pool` at normal priority
    pub fn new(pool: Arc<dyn ThreadPool>) -> Self {
        Self::with_priority(pool, WorkPriority::Normal)
    }

    /// Schedule onto `pool` at `priority`
    pub fn with_priority(pool: Arc<dyn ThreadPool>, priority: WorkPriority) -> Self {
        Self {
            backend: Arc::new(PoolBackend { pool, priority }),
        }
    }

    /// Priority used for every item
    pub fn priority(&self) -> WorkPriority {
        self.backend.priority
    }
}

impl Scheduler for PoolScheduler {
    fn create_worker(&self, lifetime: Subscription) -> Worker {
        Worker::new(lifetime, self.backend.clone())
    }
}

#[derive(Clone)]
struct PoolBackend {
    pool: Arc<dyn ThreadPool>,
    priority: WorkPriority,
}

impl PoolBackend {
    fn execute(&self, item: Schedulable) {
        let request = item.run(true);
        resubmit(self, item, request);
    }
}

impl WorkerBackend for PoolBackend {
    fn schedule_now(&self, item: Schedulable) {
        let this = self.clone();
        let queued = item.clone();
        if let Err(e) = self
            .pool
            .run(self.priority, Box::new(move || this.execute(queued)))
        {
            tracing::warn!(error = %e, "thread pool rejected scheduled action");
            item.cancel();
        }
    }

    fn schedule_at(&self, due: Instant, item: Schedulable) {
        let delay = due.saturating_duration_since(Instant::now());
        let this = self.clone();
        let fired = item.clone();
        let work = Box::new(move || this.execute(fired));

        match self.pool.create_timer(delay, self.priority, work) {
            Ok(timer) => {
                tracing::trace!(?delay, "pool timer armed");
                let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(Some(timer)));
                item.lifetime().add(move || stop_quietly(&slot));
            }
            Err(e) => {
                tracing::warn!(error = %e, "thread pool rejected timer");
                item.cancel();
            }
        }
    }
}
