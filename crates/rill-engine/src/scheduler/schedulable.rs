//! Deferred action with its own liveness check

use crate::stream::Subscription;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a [`Schedulable`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ScheduleState {
    /// Waiting to run
    Pending = 0,
    /// Body is executing
    Running = 1,
    /// Body ran to completion
    Fired = 2,
    /// Stopped before the body started; the body never runs
    Cancelled = 3,
}

impl ScheduleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ScheduleState::Pending,
            1 => ScheduleState::Running,
            2 => ScheduleState::Fired,
            _ => ScheduleState::Cancelled,
        }
    }

    /// Whether no further transitions can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, ScheduleState::Fired | ScheduleState::Cancelled)
    }
}

/// A follow-up run requested by an action
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reschedule {
    /// Run again as soon as possible
    Now,
    /// Run again no earlier than the given instant
    At(Instant),
}

/// Recursion token handed to a running action.
///
/// An action asks to run again through the token instead of scheduling a
/// nested action itself. Whether an immediate repeat runs inline or goes
/// back through the worker's queue is the backend's policy.
#[derive(Debug)]
pub struct Recurse {
    allowed: bool,
    request: Option<Reschedule>,
}

impl Recurse {
    pub(crate) fn new(allowed: bool) -> Self {
        Self {
            allowed,
            request: None,
        }
    }

    /// Whether an immediate repeat runs inline on this backend
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Run the action again as soon as possible
    pub fn again(&mut self) {
        self.request = Some(Reschedule::Now);
    }

    /// Run the action again at `due`
    pub fn again_at(&mut self, due: Instant) {
        self.request = Some(Reschedule::At(due));
    }

    /// Run the action again after `delay`
    pub fn again_after(&mut self, delay: Duration) {
        self.again_at(Instant::now() + delay);
    }

    fn take(&mut self) -> Option<Reschedule> {
        self.request.take()
    }
}

/// Body of a scheduled action
pub type Action = Box<dyn FnMut(&mut Recurse) + Send + 'static>;

struct SchedulableInner {
    state: AtomicU8,
    action: Mutex<Action>,
    lifetime: Subscription,
}

/// One deferred action plus its "still wanted" check.
///
/// Unsubscribing the lifetime cancels a pending action: its body is then
/// guaranteed never to run. Cancelling while the body runs does not
/// interrupt it, but no repeat is started afterwards.
#[derive(Clone)]
pub struct Schedulable {
    inner: Arc<SchedulableInner>,
}

impl std::fmt::Debug for Schedulable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedulable")
            .field("state", &self.state())
            .finish()
    }
}

impl Schedulable {
    /// Wrap an action bound to `lifetime`
    pub fn new(lifetime: Subscription, action: Action) -> Self {
        let inner = Arc::new(SchedulableInner {
            state: AtomicU8::new(ScheduleState::Pending as u8),
            action: Mutex::new(action),
            lifetime: lifetime.clone(),
        });
        let weak = Arc::downgrade(&inner);
        lifetime.add(move || {
            if let Some(inner) = weak.upgrade() {
                let _ = inner.state.compare_exchange(
                    ScheduleState::Pending as u8,
                    ScheduleState::Cancelled as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
        });
        Self { inner }
    }

    /// Current state
    pub fn state(&self) -> ScheduleState {
        ScheduleState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// The action's lifetime; timers and other teardowns attach here
    pub fn lifetime(&self) -> &Subscription {
        &self.inner.lifetime
    }

    /// Whether the action is still wanted
    pub fn is_subscribed(&self) -> bool {
        self.inner.lifetime.is_subscribed()
    }

    /// Cancel the action if it has not started
    pub fn cancel(&self) {
        self.inner.lifetime.unsubscribe();
    }

    /// Run the body if it is still wanted.
    ///
    /// With `recursion_allowed`, immediate repeats loop inline; otherwise
    /// they are handed back to the caller along with timed repeats.
    pub fn run(&self, recursion_allowed: bool) -> Option<Reschedule> {
        loop {
            if self
                .inner
                .state
                .compare_exchange(
                    ScheduleState::Pending as u8,
                    ScheduleState::Running as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                return None;
            }
            if !self.is_subscribed() {
                self.set_state(ScheduleState::Cancelled);
                return None;
            }

            let mut recurse = Recurse::new(recursion_allowed);
            {
                let mut action = self.inner.action.lock();
                (*action)(&mut recurse);
            }

            match recurse.take() {
                None => {
                    self.set_state(ScheduleState::Fired);
                    self.inner.lifetime.unsubscribe();
                    return None;
                }
                Some(request) => {
                    self.set_state(ScheduleState::Pending);
                    if !self.is_subscribed() {
                        self.set_state(ScheduleState::Cancelled);
                        return None;
                    }
                    match request {
                        Reschedule::Now if recursion_allowed => {
                            tracing::trace!("recursing inline");
                            continue;
                        }
                        request => return Some(request),
                    }
                }
            }
        }
    }

    fn set_state(&self, state: ScheduleState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }
}
