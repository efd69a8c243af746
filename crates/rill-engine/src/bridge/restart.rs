//! Restart wrappers
//!
//! Async operations run once and cannot be restarted, so re-subscribing to a
//! bridged operation only observes the same outcome again. These wrappers
//! call an operation factory on every subscription instead, which is what
//! makes a caller-composed retry re-run the underlying work.

use crate::bridge::async_op::from_async;
use crate::bridge::progress::{from_async_with_progress, ProgressStreams};
use crate::stream::Observable;
use rill_sdk::{AsyncOperation, AsyncOperationWithProgress};

/// Start a fresh operation for every subscription and bridge it
pub fn start_async<Op, F>(factory: F) -> Observable<Op::Output>
where
    Op: AsyncOperation,
    Op::Output: Clone,
    F: Fn() -> Op + Send + Sync + 'static,
{
    Observable::defer(move || {
        tracing::trace!("starting fresh operation");
        from_async(factory())
    })
}

/// Start a fresh operation with progress for every subscription.
///
/// Each subscription receives one [`ProgressStreams`] pair for its own
/// operation, then completes.
pub fn start_async_with_progress<Op, F>(
    factory: F,
) -> Observable<ProgressStreams<Op::Output, Op::Progress>>
where
    Op: AsyncOperationWithProgress,
    Op::Output: Clone,
    Op::Progress: Clone,
    F: Fn() -> Op + Send + Sync + 'static,
{
    Observable::create(move |subscriber| {
        tracing::trace!("starting fresh operation with progress");
        subscriber.on_next(from_async_with_progress(factory()));
        subscriber.on_completed();
    })
}
