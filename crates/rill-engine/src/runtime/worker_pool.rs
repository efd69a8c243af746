//! In-process thread pool
//!
//! Worker threads pull from one injector per priority, highest first, and
//! sleep on a condvar when every injector is empty. Delayed work goes
//! through a dedicated [`TimerThread`] that pushes due items back onto the
//! injectors.

use crate::config::PoolConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::runtime::timer::{join_with_timeout, TimerThread};
use crate::scheduler::PoolScheduler;
use crate::stream::panic_message;
use crossbeam_deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex};
use rill_sdk::{DispatchError, ThreadPool, TimerHandle, Work, WorkPriority};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Run queues shared by the workers
struct PoolShared {
    /// Indexed by [`slot`]: high, normal, low
    injectors: [Injector<Work>; 3],
    /// Guards the idle wait against lost wakeups
    idle: Mutex<()>,
    available: Condvar,
    shutdown: AtomicBool,
    /// Items that panicked (for debugging/stats)
    panicked: AtomicUsize,
    idle_wait: Duration,
}

fn slot(priority: WorkPriority) -> usize {
    match priority {
        WorkPriority::High => 0,
        WorkPriority::Normal => 1,
        WorkPriority::Low => 2,
    }
}

impl PoolShared {
    fn push(&self, priority: WorkPriority, work: Work) -> Result<(), DispatchError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::Closed);
        }
        self.injectors[slot(priority)].push(work);
        let _idle = self.idle.lock();
        self.available.notify_one();
        Ok(())
    }

    fn find_work(&self) -> Option<Work> {
        for injector in &self.injectors {
            loop {
                match injector.steal() {
                    Steal::Success(work) => return Some(work),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.injectors.iter().all(Injector::is_empty)
    }

    /// Worker thread main loop
    fn run_loop(&self, index: usize) {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            match self.find_work() {
                Some(work) => self.execute(index, work),
                None => {
                    let mut idle = self.idle.lock();
                    if self.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    if self.is_empty() {
                        self.available.wait_for(&mut idle, self.idle_wait);
                    }
                }
            }
        }
        tracing::debug!(worker = index, "pool worker shutting down");
    }

    fn execute(&self, index: usize, work: Work) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
            self.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                worker = index,
                panic = panic_message(payload.as_ref()),
                "pool work item panicked"
            );
        }
    }
}

/// Handle implementing the [`ThreadPool`] contract
struct PoolHandle {
    shared: Arc<PoolShared>,
    timer: Arc<TimerThread>,
}

impl ThreadPool for PoolHandle {
    fn run(&self, priority: WorkPriority, work: Work) -> Result<(), DispatchError> {
        self.shared.push(priority, work)
    }

    fn create_timer(
        &self,
        delay: Duration,
        priority: WorkPriority,
        work: Work,
    ) -> Result<TimerHandle, DispatchError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::Closed);
        }
        Ok(Box::new(self.timer.arm(delay, priority, work)))
    }
}

/// A fixed set of named worker threads plus a timer thread.
///
/// Shut down on drop.
pub struct WorkerPool {
    handle: Arc<PoolHandle>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Start a pool
    pub fn new(config: PoolConfig) -> ConfigResult<Self> {
        let worker_count = config.worker_count();
        let shared = Arc::new(PoolShared {
            injectors: [Injector::new(), Injector::new(), Injector::new()],
            idle: Mutex::new(()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            panicked: AtomicUsize::new(0),
            idle_wait: config.idle_wait(),
        });

        let timer = TimerThread::new();
        let pool = Self {
            handle: Arc::new(PoolHandle {
                shared: shared.clone(),
                timer: timer.clone(),
            }),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            worker_count,
        };

        let sink = shared.clone();
        timer.start(format!("{}-timer", config.thread_name), move |priority, work| {
            if sink.push(priority, work).is_err() {
                tracing::trace!("timer fired after pool shutdown; dropping work");
            }
        })?;

        for index in 0..worker_count {
            let name = format!("{}-{}", config.thread_name, index);
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || shared.run_loop(index))
                .map_err(|source| ConfigError::Spawn { name, source })?;
            pool.workers.lock().push(handle);
        }

        tracing::debug!(workers = worker_count, "worker pool started");
        Ok(pool)
    }

    /// Start a pool with `workers` threads and default settings
    pub fn with_workers(workers: usize) -> ConfigResult<Self> {
        Self::new(PoolConfig::with_workers(workers))
    }

    /// The pool as a [`ThreadPool`]
    pub fn pool(&self) -> Arc<dyn ThreadPool> {
        self.handle.clone()
    }

    /// A scheduler backed by this pool
    pub fn scheduler(&self) -> PoolScheduler {
        PoolScheduler::new(self.pool())
    }

    /// A scheduler backed by this pool at `priority`
    pub fn scheduler_with_priority(&self, priority: WorkPriority) -> PoolScheduler {
        PoolScheduler::with_priority(self.pool(), priority)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of work items that panicked
    pub fn panicked_count(&self) -> usize {
        self.handle.shared.panicked.load(Ordering::Relaxed)
    }

    /// Stop accepting work and stop every thread
    pub fn shutdown(&self) {
        let shared = &self.handle.shared;
        if shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let _idle = shared.idle.lock();
            shared.available.notify_all();
        }
        self.handle.timer.stop();

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            join_with_timeout(handle, Duration::from_secs(2));
        }
        tracing::debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
