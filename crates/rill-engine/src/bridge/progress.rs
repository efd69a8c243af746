//! Result + progress async bridge

use crate::error::StreamError;
use crate::shared::ReplayLast;
use crate::stream::Observable;
use rill_sdk::{AsyncOperationWithProgress, AsyncStatus, OperationError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The two streams split from one operation with progress
pub struct ProgressStreams<R, P> {
    /// Emits the result once, then completes
    pub result: Observable<R>,

    /// Emits progress with replay-last semantics; completes with the operation
    pub progress: Observable<P>,
}

impl<R, P> Clone for ProgressStreams<R, P> {
    fn clone(&self) -> Self {
        Self {
            result: self.result.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<R, P> std::fmt::Debug for ProgressStreams<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStreams").finish_non_exhaustive()
    }
}

struct ProgressActivation<Op: AsyncOperationWithProgress> {
    op: Arc<Op>,
    registered: AtomicBool,
    result: ReplayLast<Op::Output>,
    progress: ReplayLast<Op::Progress>,
}

impl<Op> ProgressActivation<Op>
where
    Op: AsyncOperationWithProgress,
    Op::Output: Clone,
    Op::Progress: Clone,
{
    fn ensure_registered(&self) {
        if self.registered.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("registering progress and completion handlers");

        let progress = self.progress.clone();
        let attached = self
            .op
            .on_progress(Box::new(move |value: Op::Progress| progress.emit(value)));
        if let Err(e) = attached {
            self.fail_registration(e);
            return;
        }

        let op = Arc::downgrade(&self.op);
        let result = self.result.clone();
        let progress = self.progress.clone();
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
            progress.complete();
        }));
        if let Err(e) = registered {
            self.fail_registration(e);
        }
    }

    fn fail_registration(&self, error: OperationError) {
        let error = StreamError::Registration(error);
        tracing::warn!(%error, "failed to attach operation handlers");
        self.result.error(error.clone());
        self.progress.error(error);
    }
}

/// Split an operation with progress into a result stream and a progress stream.
///
/// Nothing is registered until either stream gains its first subscriber;
/// both streams then share that one registration.
///
/// The progress stream forwards every progress value live. A subscriber
/// joining mid-flight first receives the most recent value. It completes
/// when the operation completes, after the result stream has delivered.
///
/// The result stream stays silent until completion, then emits the result
/// and completes (or fails with [`StreamError::Extraction`]). A subscriber
/// joining after completion receives the cached terminal notification.
/// If a handler cannot be attached, both streams fail with
/// [`StreamError::Registration`].
pub fn from_async_with_progress<Op>(op: Op) -> ProgressStreams<Op::Output, Op::Progress>
where
    Op: AsyncOperationWithProgress,
    Op::Output: Clone,
    Op::Progress: Clone,
{
    let activation = Arc::new(ProgressActivation {
        op: Arc::new(op),
        registered: AtomicBool::new(false),
        result: ReplayLast::new(),
        progress: ReplayLast::new(),
    });

    let for_result = activation.clone();
    let result = Observable::create(move |subscriber| {
        let op = Arc::clone(&for_result.op);
        subscriber.add(move || drop(op));
        for_result.result.attach(subscriber);
        for_result.ensure_registered();
    });

    let progress = Observable::create(move |subscriber| {
        let op = Arc::clone(&activation.op);
        subscriber.add(move || drop(op));
        activation.progress.attach(subscriber);
        activation.ensure_registered();
    });

    ProgressStreams { result, progress }
}
