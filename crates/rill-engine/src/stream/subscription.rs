//! Composite subscription lifetime
//!
//! A [`Subscription`] owns a list of teardown actions. Unsubscribing flips
//! the liveness flag and runs each teardown exactly once. Teardowns added
//! after unsubscription run immediately.
//!
//! Teardown runs on disposal paths where failure cannot be surfaced, so each
//! one runs under panic isolation; a panicking teardown is logged and
//! discarded and the remaining teardowns still run.

use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Action run when a subscription ends
pub type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a teardown registered on a [`Subscription`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TeardownId(u64);

/// Registered teardowns, in registration order
struct Teardowns {
    next_id: u64,
    entries: Vec<(u64, Teardown)>,
}

struct SubscriptionInner {
    /// Liveness flag
    subscribed: AtomicBool,

    /// Pending teardowns
    teardowns: Mutex<Teardowns>,
}

/// Cancellable lifetime shared by a subscriber, a schedulable or a worker.
///
/// Clones refer to the same lifetime.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl Subscription {
    /// Create a live subscription
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                subscribed: AtomicBool::new(true),
                teardowns: Mutex::new(Teardowns {
                    next_id: 1,
                    entries: Vec::new(),
                }),
            }),
        }
    }

    /// Create a subscription that has already ended
    pub fn closed() -> Self {
        let subscription = Self::new();
        subscription.inner.subscribed.store(false, Ordering::Release);
        subscription
    }

    /// Whether the lifetime is still live
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.load(Ordering::Acquire)
    }

    /// Register a teardown
    ///
    /// Runs immediately (and returns `None`) if the subscription has already ended.
    pub fn add<F>(&self, teardown: F) -> Option<TeardownId>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut teardowns = self.inner.teardowns.lock();
        if !self.is_subscribed() {
            drop(teardowns);
            run_teardown(Box::new(teardown));
            return None;
        }
        let id = teardowns.next_id;
        teardowns.next_id += 1;
        teardowns.entries.push((id, Box::new(teardown)));
        Some(TeardownId(id))
    }

    /// Drop a registered teardown without running it
    pub fn remove(&self, id: TeardownId) -> bool {
        let mut teardowns = self.inner.teardowns.lock();
        match teardowns.entries.iter().position(|(i, _)| *i == id.0) {
            Some(index) => {
                teardowns.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Tie `child` to this lifetime
    ///
    /// Unsubscribing `self` unsubscribes `child`; a child that ends first
    /// removes its entry from `self`.
    pub fn add_child(&self, child: &Subscription) {
        if Arc::ptr_eq(&self.inner, &child.inner) {
            return;
        }
        let weak_child = Arc::downgrade(&child.inner);
        let id = self.add(move || {
            if let Some(inner) = weak_child.upgrade() {
                Subscription { inner }.unsubscribe();
            }
        });
        if let Some(id) = id {
            let weak_parent: Weak<SubscriptionInner> = Arc::downgrade(&self.inner);
            child.add(move || {
                if let Some(inner) = weak_parent.upgrade() {
                    Subscription { inner }.remove(id);
                }
            });
        }
    }

    /// End the lifetime and run every teardown once
    pub fn unsubscribe(&self) {
        if !self.inner.subscribed.swap(false, Ordering::AcqRel) {
            return;
        }
        let entries = std::mem::take(&mut self.inner.teardowns.lock().entries);
        for (_, teardown) in entries {
            run_teardown(teardown);
        }
    }

    /// Number of pending teardowns
    pub fn teardown_count(&self) -> usize {
        self.inner.teardowns.lock().entries.len()
    }
}

fn run_teardown(teardown: Teardown) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(teardown)) {
        tracing::warn!(
            panic = panic_message(payload.as_ref()),
            "teardown panicked; discarding"
        );
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
