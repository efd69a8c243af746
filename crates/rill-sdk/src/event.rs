//! Register/unregister event source contract
//!
//! An event source is a capability pair rather than a type hierarchy:
//! `register` attaches a handler and returns a token, `unregister` detaches
//! the handler that token names.

use crate::error::DisposalError;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback receiving raised events
pub type EventHandler<E> = Arc<dyn Fn(E) + Send + Sync + 'static>;

type RegisterFn<E, Tok> = dyn Fn(EventHandler<E>) -> Tok + Send + Sync + 'static;
type UnregisterFn<Tok> = dyn Fn(Tok) -> Result<(), DisposalError> + Send + Sync + 'static;

/// A `{register, unregister}` capability pair over a handler/token protocol.
pub struct EventSource<E, Tok> {
    register: Arc<RegisterFn<E, Tok>>,
    unregister: Arc<UnregisterFn<Tok>>,
}

impl<E, Tok> Clone for EventSource<E, Tok> {
    fn clone(&self) -> Self {
        Self {
            register: Arc::clone(&self.register),
            unregister: Arc::clone(&self.unregister),
        }
    }
}

impl<E, Tok> EventSource<E, Tok> {
    /// Build a source from its two capabilities
    pub fn new<R, U>(register: R, unregister: U) -> Self
    where
        R: Fn(EventHandler<E>) -> Tok + Send + Sync + 'static,
        U: Fn(Tok) -> Result<(), DisposalError> + Send + Sync + 'static,
    {
        Self {
            register: Arc::new(register),
            unregister: Arc::new(unregister),
        }
    }

    /// Attach a handler
    pub fn register(&self, handler: EventHandler<E>) -> Tok {
        (self.register)(handler)
    }

    /// Detach the handler named by `token`
    pub fn unregister(&self, token: Tok) -> Result<(), DisposalError> {
        (self.unregister)(token)
    }
}

/// Token identifying a handler attached to an [`EventHub`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EventToken(u64);

impl EventToken {
    /// Get the numeric token value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// In-process multicast event with add/remove tokens.
///
/// Stands in for platform events (pointer input, timers, sensors) and hands
/// out an [`EventSource`] view of itself.
pub struct EventHub<E> {
    handlers: Arc<Mutex<FxHashMap<u64, EventHandler<E>>>>,
    next_token: Arc<AtomicU64>,
}

impl<E> Clone for EventHub<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            next_token: Arc::clone(&self.next_token),
        }
    }
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventHub<E> {
    /// Create an event with no handlers
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(FxHashMap::default())),
            next_token: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Attach a handler
    pub fn add(&self, handler: EventHandler<E>) -> EventToken {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().insert(id, handler);
        EventToken(id)
    }

    /// Detach a handler
    pub fn remove(&self, token: EventToken) -> Result<(), DisposalError> {
        match self.handlers.lock().remove(&token.0) {
            Some(_) => Ok(()),
            None => Err(DisposalError::UnknownToken(token.0)),
        }
    }

    /// Number of attached handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

impl<E: Clone> EventHub<E> {
    /// Deliver an event to every attached handler on the calling thread
    pub fn raise(&self, event: E) {
        // Snapshot so handlers may add/remove while being called
        let handlers: Vec<EventHandler<E>> = self.handlers.lock().values().cloned().collect();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

impl<E: Send + 'static> EventHub<E> {
    /// View this event as a register/unregister capability pair
    pub fn source(&self) -> EventSource<E, EventToken> {
        let add = self.clone();
        let remove = self.clone();
        EventSource::new(move |handler| add.add(handler), move |token| remove.remove(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_add_raise_remove() {
        let hub: EventHub<i32> = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let token = hub.add(Arc::new(move |e| s.lock().push(e)));

        hub.raise(1);
        hub.raise(2);
        hub.remove(token).unwrap();
        hub.raise(3);

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(hub.handler_count(), 0);
    }

    #[test]
    fn test_remove_unknown_token() {
        let hub: EventHub<()> = EventHub::new();
        let token = hub.add(Arc::new(|_| {}));
        hub.remove(token).unwrap();
        assert_eq!(
            hub.remove(token),
            Err(DisposalError::UnknownToken(token.as_u64()))
        );
    }

    #[test]
    fn test_source_view_shares_handlers() {
        let hub: EventHub<u8> = EventHub::new();
        let source = hub.source();
        let token = source.register(Arc::new(|_| {}));
        assert_eq!(hub.handler_count(), 1);
        source.unregister(token).unwrap();
        assert_eq!(hub.handler_count(), 0);
    }
}
