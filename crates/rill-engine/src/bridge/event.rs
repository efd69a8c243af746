//! Event-source bridge

use crate::shared::RefCount;
use crate::stream::{panic_message, Observable, Subscriber};
use rill_sdk::{EventHandler, EventSource};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Bridge a register/unregister pair to a shared stream.
///
/// The first subscriber registers one handler; later subscribers share it.
/// When the last subscriber leaves, the handler is unregistered once with
/// the token captured at registration. Unregistration failures are logged
/// and discarded; they never reach the caller that unsubscribed.
///
/// Events are delivered on whatever thread raises them.
pub fn from_event<E, Tok>(source: EventSource<E, Tok>) -> Observable<E>
where
    E: Clone + Send + 'static,
    Tok: Send + 'static,
{
    let raw = Observable::create(move |subscriber: Subscriber<E>| {
        let sink = subscriber.clone();
        let handler: EventHandler<E> = Arc::new(move |event| sink.on_next(event));

        tracing::debug!("registering event handler");
        let token = source.register(handler);

        let source = source.clone();
        subscriber.add(move || unregister_quietly(&source, token));
    });
    RefCount::new(raw).observable()
}

fn unregister_quietly<E, Tok>(source: &EventSource<E, Tok>, token: Tok) {
    match panic::catch_unwind(AssertUnwindSafe(|| source.unregister(token))) {
        Ok(Ok(())) => tracing::debug!("event handler unregistered"),
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to unregister event handler; discarding"),
        Err(payload) => tracing::warn!(
            panic = panic_message(payload.as_ref()),
            "unregister panicked; discarding"
        ),
    }
}
