//! Single-result async bridge

use crate::error::StreamError;
use crate::shared::ReplayLast;
use crate::stream::Observable;
use rill_sdk::{AsyncOperation, AsyncStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One registration with an operation, shared by every subscriber
struct AsyncActivation<Op: AsyncOperation> {
    op: Arc<Op>,
    /// Set once the completion handler has been attached
    registered: AtomicBool,
    result: ReplayLast<Op::Output>,
}

impl<Op> AsyncActivation<Op>
where
    Op: AsyncOperation,
    Op::Output: Clone,
{
    fn ensure_registered(&self) {
        if self.registered.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("registering completion handler");

        // The operation owns its handler, so the handler must not own it back
        let op = Arc::downgrade(&self.op);
        let result = self.result.clone();
        let registered = self.op.on_completed(Box::new(move |status: AsyncStatus| {
            tracing::trace!(?status, "operation completed");
            let Some(op) = op.upgrade() else {
                tracing::trace!("operation completed with no stream left");
                return;
            };
            match op.results() {
                Ok(value) => result.complete_with(value),
                Err(e) => result.error(StreamError::Extraction(e)),
            }
        }));

        if let Err(e) = registered {
            tracing::warn!(error = %e, "failed to attach completion handler");
            self.result.error(StreamError::Registration(e));
        }
    }
}

/// Bridge a single-shot operation to a shared stream.
///
/// The first subscription attaches the completion handler; every other
/// subscription shares it. On completion each subscriber receives the
/// result and completion, or an [`StreamError::Extraction`] error if the
/// result cannot be read. Subscribers arriving after completion receive the
/// same cached terminal notification.
///
/// Unsubscribing does not cancel the operation: it runs to completion and
/// its result is cached for any later subscriber. A registration failure
/// fails the stream with [`StreamError::Registration`].
///
/// The operation is kept alive by the returned stream and by its live
/// subscriptions. Once both are gone it is released, even if it never
/// completes.
pub fn from_async<Op>(op: Op) -> Observable<Op::Output>
where
    Op: AsyncOperation,
    Op::Output: Clone,
{
    let activation = Arc::new(AsyncActivation {
        op: Arc::new(op),
        registered: AtomicBool::new(false),
        result: ReplayLast::new(),
    });
    Observable::create(move |subscriber| {
        let op = Arc::clone(&activation.op);
        subscriber.add(move || drop(op));
        activation.result.attach(subscriber);
        activation.ensure_registered();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Notification;
    use parking_lot::Mutex;
    use rill_sdk::{CompletionSource, OperationError};

    #[test]
    fn test_lazy_registration() {
        let source: CompletionSource<i32> = CompletionSource::new();
        let stream = from_async(source.clone());
        assert!(!source.has_completed_handler());

        stream.subscribe_fn(|_| {});
        assert!(source.has_completed_handler());
    }

    #[test]
    fn test_canceled_operation_surfaces_as_error() {
        let source: CompletionSource<i32> = CompletionSource::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        from_async(source.clone()).subscribe_fn(move |n| l.lock().push(n));

        source.cancel();
        assert_eq!(
            *log.lock(),
            vec![Notification::Error(StreamError::Extraction(
                OperationError::Canceled
            ))]
        );
    }

    #[test]
    fn test_handler_already_attached_fails_stream() {
        let source: CompletionSource<i32> = CompletionSource::new();
        source.on_completed(Box::new(|_| {})).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        from_async(source).subscribe_fn(move |n| l.lock().push(n));
        assert_eq!(
            *log.lock(),
            vec![Notification::Error(StreamError::Registration(
                OperationError::HandlerAlreadySet("completed")
            ))]
        );
    }
}
