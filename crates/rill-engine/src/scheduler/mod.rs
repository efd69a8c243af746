//! Schedulers: where and when work runs
//!
//! One [`Worker`] interface with two operations (`schedule_now`,
//! `schedule_at`) sits in front of every backend. [`UiScheduler`] targets a
//! serialized dispatch queue and never recurses inline; [`PoolScheduler`]
//! targets a thread pool and does.

mod pool;
mod schedulable;
mod ui;
mod worker;

pub use pool::PoolScheduler;
pub use schedulable::{Action, Recurse, Reschedule, ScheduleState, Schedulable};
pub use ui::{current_queue, install_current_queue, CurrentQueueGuard, UiScheduler};
pub use worker::{due_soon, Scheduler, Worker, WorkerBackend, MIN_TIMER_DELAY};
