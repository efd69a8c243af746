//! In-process serialized dispatch queue
//!
//! One named thread drains a priority queue (FIFO within a priority) and
//! fires one-shot timers whose ticks run on the same thread. The loop
//! installs itself as the thread's current dispatch queue, so code running
//! on it can call [`UiScheduler::current`].

use crate::config::EventLoopConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::runtime::timer::join_with_timeout;
use crate::scheduler::{install_current_queue, UiScheduler};
use crate::stream::panic_message;
use crossbeam::channel;
use parking_lot::{Condvar, Mutex};
use rill_sdk::{
    DispatchError, DispatchPriority, DispatchQueue, DisposalError, Timer, TimerHandle, Work,
};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Work waiting in the loop's queue
struct Posted {
    priority: DispatchPriority,
    seq: u64,
    work: Work,
}

// Highest priority first, then posting order
impl Ord for Posted {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Posted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Posted {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Posted {}

/// One-shot timer bound to the loop
struct LoopTimer {
    due: Instant,
    seq: u64,
    stopped: Arc<AtomicBool>,
    tick: Work,
}

// Reverse ordering for min-heap (earliest due time first)
impl Ord for LoopTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for LoopTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LoopTimer {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for LoopTimer {}

struct LoopState {
    queue: BinaryHeap<Posted>,
    timers: BinaryHeap<LoopTimer>,
    next_seq: u64,
}

impl LoopState {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

struct LoopShared {
    state: Mutex<LoopState>,
    /// Wakes the loop on new work, an earlier timer, or shutdown
    wake: Condvar,
    shutdown: AtomicBool,
    thread: OnceLock<ThreadId>,
}

impl LoopShared {
    /// Next item to run, or None on shutdown
    fn next_work(&self) -> Option<Work> {
        let mut state = self.state.lock();
        loop {
            if self.shutdown.load(AtomicOrdering::Acquire) {
                return None;
            }

            // Due timers join the queue behind already-posted work
            let now = Instant::now();
            while state.timers.peek().is_some_and(|t| t.due <= now) {
                if let Some(timer) = state.timers.pop() {
                    if !timer.stopped.load(AtomicOrdering::Acquire) {
                        let seq = state.next_seq();
                        state.queue.push(Posted {
                            priority: DispatchPriority::Normal,
                            seq,
                            work: timer.tick,
                        });
                    }
                }
            }

            if let Some(posted) = state.queue.pop() {
                return Some(posted.work);
            }

            match state.timers.peek() {
                Some(next) => {
                    let timeout = next.due.saturating_duration_since(now);
                    self.wake.wait_for(&mut state, timeout);
                }
                None => self.wake.wait(&mut state),
            }
        }
    }

    fn run_loop(self: Arc<Self>) {
        let _ = self.thread.set(thread::current().id());
        let queue: Arc<dyn DispatchQueue> = Arc::new(LoopQueue {
            shared: Arc::downgrade(&self),
        });
        let _current = install_current_queue(queue);

        while let Some(work) = self.next_work() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
                tracing::warn!(
                    panic = panic_message(payload.as_ref()),
                    "event loop work item panicked"
                );
            }
        }
        tracing::debug!("event loop shutting down");
    }
}

/// The loop as a [`DispatchQueue`]
struct LoopQueue {
    shared: Weak<LoopShared>,
}

impl LoopQueue {
    fn live(&self) -> Result<Arc<LoopShared>, DispatchError> {
        match self.shared.upgrade() {
            Some(shared) if !shared.shutdown.load(AtomicOrdering::Acquire) => Ok(shared),
            _ => Err(DispatchError::Closed),
        }
    }
}

impl DispatchQueue for LoopQueue {
    fn post(&self, priority: DispatchPriority, work: Work) -> Result<(), DispatchError> {
        let shared = self.live()?;
        let mut state = shared.state.lock();
        let seq = state.next_seq();
        state.queue.push(Posted {
            priority,
            seq,
            work,
        });
        shared.wake.notify_one();
        Ok(())
    }

    fn start_timer(&self, interval: Duration, tick: Work) -> Result<TimerHandle, DispatchError> {
        let shared = self.live()?;
        let stopped = Arc::new(AtomicBool::new(false));
        let mut state = shared.state.lock();
        let seq = state.next_seq();
        state.timers.push(LoopTimer {
            due: Instant::now() + interval,
            seq,
            stopped: stopped.clone(),
            tick,
        });
        shared.wake.notify_one();
        Ok(Box::new(LoopTimerHandle {
            stopped,
            owner: self.shared.clone(),
        }))
    }

    fn has_thread_access(&self) -> bool {
        self.shared
            .upgrade()
            .and_then(|shared| shared.thread.get().copied())
            .is_some_and(|id| id == thread::current().id())
    }
}

struct LoopTimerHandle {
    stopped: Arc<AtomicBool>,
    owner: Weak<LoopShared>,
}

impl Timer for LoopTimerHandle {
    fn stop(&self) -> Result<(), DisposalError> {
        self.stopped.store(true, AtomicOrdering::Release);
        if self.owner.upgrade().is_none() {
            return Err(DisposalError::Released);
        }
        Ok(())
    }
}

/// A serialized dispatch queue running on its own thread.
///
/// Shut down on drop; work still queued at shutdown is dropped.
pub struct EventLoop {
    shared: Arc<LoopShared>,
    queue: Arc<LoopQueue>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Start a loop
    pub fn new(config: EventLoopConfig) -> ConfigResult<Self> {
        let shared = Arc::new(LoopShared {
            state: Mutex::new(LoopState {
                queue: BinaryHeap::new(),
                timers: BinaryHeap::new(),
                next_seq: 0,
            }),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
            thread: OnceLock::new(),
        });

        let runner = shared.clone();
        let name = config.thread_name;
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || runner.run_loop())
            .map_err(|source| ConfigError::Spawn {
                name: name.clone(),
                source,
            })?;
        let _ = shared.thread.set(handle.thread().id());

        tracing::debug!(thread = %name, "event loop started");
        Ok(Self {
            queue: Arc::new(LoopQueue {
                shared: Arc::downgrade(&shared),
            }),
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Start a loop with default settings
    pub fn start() -> ConfigResult<Self> {
        Self::new(EventLoopConfig::default())
    }

    /// The loop as a [`DispatchQueue`]
    pub fn queue(&self) -> Arc<dyn DispatchQueue> {
        self.queue.clone()
    }

    /// A scheduler backed by this loop
    pub fn scheduler(&self) -> UiScheduler {
        UiScheduler::new(self.queue())
    }

    /// A scheduler backed by this loop at `priority`
    pub fn scheduler_with_priority(&self, priority: DispatchPriority) -> UiScheduler {
        UiScheduler::with_priority(self.queue(), priority)
    }

    /// Run `f` on the loop thread and wait for its result
    ///
    /// Runs inline when called from the loop thread.
    pub fn invoke<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.queue.has_thread_access() {
            return Ok(f());
        }
        let (tx, rx) = channel::bounded(1);
        self.queue.post(
            DispatchPriority::Normal,
            Box::new(move || {
                let _ = tx.send(f());
            }),
        )?;
        rx.recv().map_err(|_| DispatchError::Closed)
    }

    /// Number of queued items
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Stop the loop thread
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, AtomicOrdering::AcqRel) {
            return;
        }
        {
            let _state = self.shared.state.lock();
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            join_with_timeout(handle, Duration::from_secs(2));
        }
        let mut state = self.shared.state.lock();
        state.queue.clear();
        state.timers.clear();
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fifo_within_priority() {
        let event_loop = EventLoop::start().unwrap();
        let queue = event_loop.queue();
        let (tx, rx) = channel::unbounded();

        // Block the loop so every post below is queued before any runs
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        queue
            .post(
                DispatchPriority::Normal,
                Box::new(move || {
                    let _ = release_rx.recv();
                }),
            )
            .unwrap();

        for (priority, label) in [
            (DispatchPriority::Normal, "n1"),
            (DispatchPriority::Low, "low"),
            (DispatchPriority::Normal, "n2"),
            (DispatchPriority::High, "high"),
        ] {
            let tx = tx.clone();
            queue
                .post(
                    priority,
                    Box::new(move || {
                        let _ = tx.send(label);
                    }),
                )
                .unwrap();
        }
        release_tx.send(()).unwrap();

        let order: Vec<&str> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(order, vec!["high", "n1", "n2", "low"]);
    }

    #[test]
    fn test_thread_access_and_current_queue() {
        let event_loop = EventLoop::start().unwrap();
        assert!(!event_loop.queue().has_thread_access());

        let (access, current) = event_loop
            .invoke(|| {
                let queue = crate::scheduler::current_queue();
                let access = queue.as_ref().is_some_and(|q| q.has_thread_access());
                (access, UiScheduler::current().is_ok())
            })
            .unwrap();
        assert!(access);
        assert!(current);
    }

    #[test]
    fn test_stopped_timer_never_ticks() {
        let event_loop = EventLoop::start().unwrap();
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        let timer = event_loop
            .queue()
            .start_timer(
                Duration::from_millis(30),
                Box::new(move || {
                    t.fetch_add(1, AtomicOrdering::SeqCst);
                }),
            )
            .unwrap();
        timer.stop().unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(ticks.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let event_loop = EventLoop::start().unwrap();
        let queue = event_loop.queue();
        event_loop.shutdown();

        assert_eq!(
            queue.post(DispatchPriority::Normal, Box::new(|| {})),
            Err(DispatchError::Closed)
        );
        assert!(event_loop.invoke(|| 1).is_err());
    }
}
