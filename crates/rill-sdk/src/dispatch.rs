//! Execution primitives supplied by the host
//!
//! Scheduler backends never create threads. They run on a serialized
//! dispatch queue (a UI thread) or a thread pool provided through these
//! traits, together with the queue's or pool's own cancellable timers.

use crate::error::{DispatchError, DisposalError};
use std::time::Duration;

/// Unit of work posted to a queue or pool
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Priority of work posted to a serialized dispatch queue
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DispatchPriority {
    /// Runs only when nothing else is queued
    Idle,
    /// Below normal
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Ahead of normal work
    High,
}

/// Priority of work posted to a thread pool
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkPriority {
    /// Below normal
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Ahead of normal work
    High,
}

/// A cancellable one-shot timer
pub trait Timer: Send + Sync {
    /// Stop the timer; its work will not be run if it has not fired yet
    fn stop(&self) -> Result<(), DisposalError>;
}

/// Owned handle to a host timer
pub type TimerHandle = Box<dyn Timer>;

/// A single serialized execution queue.
///
/// Work posted at the same priority runs in posting order, one item at a
/// time, on the queue's thread.
pub trait DispatchQueue: Send + Sync + 'static {
    /// Post work to the queue
    fn post(&self, priority: DispatchPriority, work: Work) -> Result<(), DispatchError>;

    /// Arm a one-shot timer whose tick runs on the queue's thread
    fn start_timer(&self, interval: Duration, tick: Work) -> Result<TimerHandle, DispatchError>;

    /// Whether the calling thread is the queue's thread
    fn has_thread_access(&self) -> bool;
}

/// A shared pool of worker threads with no ordering between items.
pub trait ThreadPool: Send + Sync + 'static {
    /// Queue work on the pool
    fn run(&self, priority: WorkPriority, work: Work) -> Result<(), DispatchError>;

    /// Run work on the pool after `delay`, unless the returned timer is stopped first
    fn create_timer(
        &self,
        delay: Duration,
        priority: WorkPriority,
        work: Work,
    ) -> Result<TimerHandle, DispatchError>;
}
