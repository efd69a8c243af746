//! UI-Affine Scheduler Tests
//!
//! Runs the serialized-queue backend on an in-process event loop:
//! - Immediate actions run in submission order
//! - Delayed actions run in due-time order
//! - Cancellation before due time skips the body
//! - Recursion is re-queued, never run inline
//! - Construction fails without a current queue
//!
//! # Running Tests
//! ```bash
//! cargo test --test ui_scheduler
//! ```

use crossbeam::channel;
use rill_engine::{ConfigError, EventLoop, Scheduler, Subscription, UiScheduler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

// ===== Ordering =====

#[test]
fn test_immediate_actions_run_in_order() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (tx, rx) = channel::unbounded();

    for label in ["A", "B", "C"] {
        let tx = tx.clone();
        worker.schedule(move || {
            let _ = tx.send(label);
        });
    }

    let order: Vec<&str> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
}

#[test]
fn test_shorter_delay_runs_first() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (tx, rx) = channel::unbounded();

    let late = tx.clone();
    worker.schedule_after(Duration::from_millis(50), move || {
        let _ = late.send(50);
    });
    worker.schedule_after(Duration::from_millis(5), move || {
        let _ = tx.send(5);
    });

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 5);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 50);
}

#[test]
fn test_actions_run_on_loop_thread() {
    let event_loop = EventLoop::start().unwrap();
    let queue = event_loop.queue();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (tx, rx) = channel::unbounded();

    let tx2 = tx.clone();
    let q = queue.clone();
    worker.schedule(move || {
        let _ = tx.send(q.has_thread_access());
    });
    let q = queue.clone();
    worker.schedule_after(Duration::from_millis(30), move || {
        let _ = tx2.send(q.has_thread_access());
    });

    assert!(rx.recv_timeout(WAIT).unwrap());
    assert!(rx.recv_timeout(WAIT).unwrap());
}

// ===== Cancellation =====

#[test]
fn test_cancel_before_due_skips_body() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let ran = Arc::new(AtomicBool::new(false));

    let r = ran.clone();
    let pending = worker.schedule_after(Duration::from_millis(40), move || {
        r.store(true, Ordering::SeqCst);
    });
    pending.unsubscribe();

    // A later action proves the loop kept running past the cancelled due time
    let (tx, rx) = channel::unbounded();
    worker.schedule_after(Duration::from_millis(80), move || {
        let _ = tx.send(());
    });
    rx.recv_timeout(WAIT).unwrap();
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_cancel_during_execution_has_no_effect() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (started_tx, started_rx) = channel::bounded(1);
    let (release_tx, release_rx) = channel::bounded::<()>(1);
    let (done_tx, done_rx) = channel::bounded(1);

    let running = worker.schedule(move || {
        let _ = started_tx.send(());
        let _ = release_rx.recv_timeout(WAIT);
        let _ = done_tx.send("finished");
    });

    started_rx.recv_timeout(WAIT).unwrap();
    running.unsubscribe();
    release_tx.send(()).unwrap();
    assert_eq!(done_rx.recv_timeout(WAIT).unwrap(), "finished");
}

#[test]
fn test_worker_unsubscribe_cancels_all_pending() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let c = count.clone();
        worker.schedule_after(Duration::from_millis(30), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    worker.unsubscribe();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

// ===== Recursion =====

#[test]
fn test_recursion_is_requeued_behind_pending_work() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (tx, rx) = channel::unbounded();

    // Block the loop so both submissions are queued before either runs
    let (release_tx, release_rx) = channel::bounded::<()>(0);
    event_loop
        .queue()
        .post(
            rill_sdk::DispatchPriority::Normal,
            Box::new(move || {
                let _ = release_rx.recv_timeout(WAIT);
            }),
        )
        .unwrap();

    let rtx = tx.clone();
    let mut runs = 0;
    worker.schedule_recursive(move |recurse| {
        runs += 1;
        let _ = rtx.send(format!("recursive-{runs}"));
        if runs < 2 {
            recurse.again();
        }
    });
    worker.schedule(move || {
        let _ = tx.send("other".to_string());
    });
    release_tx.send_timeout((), WAIT).unwrap();

    let order: Vec<String> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(order, vec!["recursive-1", "other", "recursive-2"]);
}

#[test]
fn test_delayed_recursion() {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (tx, rx) = channel::unbounded();

    let started = Instant::now();
    let mut runs = 0;
    worker.schedule_recursive(move |recurse| {
        runs += 1;
        let _ = tx.send(runs);
        if runs < 3 {
            recurse.again_after(Duration::from_millis(20));
        }
    });

    for expected in 1..=3 {
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), expected);
    }
    assert!(started.elapsed() >= Duration::from_millis(40));
}

// ===== Construction =====

#[test]
fn test_current_fails_off_loop_thread() {
    let result = thread::spawn(UiScheduler::current).join().unwrap();
    assert!(matches!(result, Err(ConfigError::NoDispatcher)));
}

#[test]
fn test_current_succeeds_on_loop_thread() {
    let event_loop = EventLoop::start().unwrap();
    let (tx, rx) = channel::unbounded();

    let t = tx.clone();
    event_loop
        .invoke(move || {
            let scheduler = UiScheduler::current().unwrap();
            let worker = scheduler.create_worker(Subscription::new());
            worker.schedule(move || {
                let _ = t.send("scheduled from loop");
            });
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "scheduled from loop");
}
