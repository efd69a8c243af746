//! Timer thread for delayed pool work
//!
//! Waits for the earliest due entry using condvar timeouts and hands each
//! due, non-stopped entry to the pool's run queue.

use crate::error::{ConfigError, ConfigResult};
use parking_lot::{Condvar, Mutex};
use rill_sdk::{DisposalError, Timer, Work, WorkPriority};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Entry in the timer heap
struct TimerEntry {
    /// When to fire
    due: Instant,
    /// Arming order, breaks ties between equal due times
    seq: u64,
    /// Set by [`PoolTimer::stop`]
    stopped: Arc<AtomicBool>,
    priority: WorkPriority,
    work: Work,
}

// Reverse ordering for min-heap (earliest due time first)
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

/// Timer thread state
struct TimerState {
    /// Armed timers, earliest first
    armed: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

/// Timer thread feeding due work back to its pool
pub(crate) struct TimerThread {
    state: Mutex<TimerState>,
    /// Wakes the timer thread when an earlier entry is armed or on shutdown
    notify: Condvar,
    shutdown: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerThread {
    /// Create a stopped timer thread
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TimerState {
                armed: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Condvar::new(),
            shutdown: AtomicBool::new(false),
            handle: Mutex::new(None),
        })
    }

    /// Spawn the thread; `fire` receives each due entry's work
    pub(crate) fn start<F>(self: &Arc<Self>, name: String, fire: F) -> ConfigResult<()>
    where
        F: Fn(WorkPriority, Work) + Send + 'static,
    {
        let timer = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || timer.run_loop(fire))
            .map_err(|source| ConfigError::Spawn { name, source })?;
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Stop the timer thread, dropping armed entries
    pub(crate) fn stop(&self) {
        self.shutdown.store(true, AtomicOrdering::Release);
        {
            let _state = self.state.lock();
            self.notify.notify_one();
        }

        if let Some(handle) = self.handle.lock().take() {
            join_with_timeout(handle, Duration::from_secs(2));
        }
        self.state.lock().armed.clear();
    }

    /// Arm a one-shot timer
    pub(crate) fn arm(
        self: &Arc<Self>,
        delay: Duration,
        priority: WorkPriority,
        work: Work,
    ) -> PoolTimer {
        let stopped = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.armed.push(TimerEntry {
            due: Instant::now() + delay,
            seq,
            stopped: stopped.clone(),
            priority,
            work,
        });
        // The new entry may be earlier than the current wait deadline
        self.notify.notify_one();
        PoolTimer {
            stopped,
            owner: Arc::downgrade(self),
        }
    }

    /// Number of armed entries, including stopped ones not yet reaped
    #[cfg(test)]
    pub(crate) fn armed_count(&self) -> usize {
        self.state.lock().armed.len()
    }

    fn run_loop<F>(&self, fire: F)
    where
        F: Fn(WorkPriority, Work),
    {
        loop {
            let mut state = self.state.lock();

            if self.shutdown.load(AtomicOrdering::Acquire) {
                break;
            }

            let now = Instant::now();
            let mut due = Vec::new();
            while state.armed.peek().is_some_and(|entry| entry.due <= now) {
                if let Some(entry) = state.armed.pop() {
                    if !entry.stopped.load(AtomicOrdering::Acquire) {
                        due.push(entry);
                    }
                }
            }

            if due.is_empty() {
                match state.armed.peek() {
                    Some(next) => {
                        let timeout = next.due.saturating_duration_since(now);
                        self.notify.wait_for(&mut state, timeout);
                    }
                    None => self.notify.wait(&mut state),
                }
                continue;
            }

            drop(state);
            for entry in due {
                fire(entry.priority, entry.work);
            }
        }

        tracing::debug!("timer thread shutting down");
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle to an armed pool timer
pub(crate) struct PoolTimer {
    stopped: Arc<AtomicBool>,
    owner: Weak<TimerThread>,
}

impl Timer for PoolTimer {
    fn stop(&self) -> Result<(), DisposalError> {
        self.stopped.store(true, AtomicOrdering::Release);
        if self.owner.upgrade().is_none() {
            return Err(DisposalError::Released);
        }
        Ok(())
    }
}

/// Join a thread, giving up after `timeout`
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        if start.elapsed() > timeout {
            tracing::warn!(
                thread = handle.thread().name().unwrap_or("<unnamed>"),
                "thread did not stop in time; detaching"
            );
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    fn started() -> (Arc<TimerThread>, channel::Receiver<WorkPriority>) {
        let (tx, rx) = channel::unbounded();
        let timer = TimerThread::new();
        timer
            .start("rill-test-timer".to_string(), move |priority, work| {
                work();
                let _ = tx.send(priority);
            })
            .unwrap();
        (timer, rx)
    }

    #[test]
    fn test_fires_in_due_order() {
        let (timer, rx) = started();
        let (tx, order) = channel::unbounded();

        for (delay, label) in [(60, "late"), (20, "early")] {
            let tx = tx.clone();
            timer.arm(
                Duration::from_millis(delay),
                WorkPriority::Normal,
                Box::new(move || {
                    let _ = tx.send(label);
                }),
            );
        }

        for _ in 0..2 {
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        assert_eq!(order.try_recv().unwrap(), "early");
        assert_eq!(order.try_recv().unwrap(), "late");
        timer.stop();
    }

    #[test]
    fn test_stopped_timer_never_fires() {
        let (timer, rx) = started();
        let handle = timer.arm(
            Duration::from_millis(30),
            WorkPriority::High,
            Box::new(|| {}),
        );
        handle.stop().unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(120)).is_err());
        assert_eq!(timer.armed_count(), 0);
        timer.stop();
    }

    #[test]
    fn test_stop_after_owner_dropped() {
        let timer = TimerThread::new();
        let handle = timer.arm(Duration::from_secs(60), WorkPriority::Low, Box::new(|| {}));
        drop(timer);
        assert_eq!(handle.stop(), Err(DisposalError::Released));
    }

    #[test]
    fn test_shutdown_with_armed_entries() {
        let (timer, _rx) = started();
        timer.arm(Duration::from_secs(60), WorkPriority::Normal, Box::new(|| {}));
        timer.stop();
        assert_eq!(timer.armed_count(), 0);
    }
}
