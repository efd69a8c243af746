//! Producer-driven async operation
//!
//! [`CompletionSource`] adapts any callback-style API into an
//! [`AsyncOperation`]: the producer keeps one clone and reports progress and
//! the outcome, the consumer attaches handlers through the operation traits.

use crate::error::OperationError;
use crate::operation::{
    AsyncOperation, AsyncOperationWithProgress, AsyncStatus, CompletedHandler, ProgressHandler,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Mutable state behind a completion source
struct SourceState<R, P> {
    /// Final outcome (None while running)
    outcome: Option<Result<R, OperationError>>,

    /// Completion handler waiting for the outcome
    completed: Option<CompletedHandler>,

    /// Whether a completion handler was ever attached
    completed_attached: bool,

    /// Progress handler
    progress: Option<Arc<ProgressHandler<P>>>,
}

/// Async operation completed by its producer.
///
/// Clones share the same operation.
pub struct CompletionSource<R, P = ()> {
    state: Arc<Mutex<SourceState<R, P>>>,
}

impl<R, P> Clone for CompletionSource<R, P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R, P> Default for CompletionSource<R, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> CompletionSource<R, P> {
    /// Create a running operation
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState {
                outcome: None,
                completed: None,
                completed_attached: false,
                progress: None,
            })),
        }
    }

    /// Report a progress value
    ///
    /// Returns false once the operation has finished; late progress is dropped.
    pub fn report_progress(&self, progress: P) -> bool {
        let handler = {
            let state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.progress.clone()
        };
        if let Some(handler) = handler {
            handler(progress);
        }
        true
    }

    /// Complete with a result
    pub fn complete(&self, result: R) -> bool {
        self.finish(Ok(result))
    }

    /// Complete with an error
    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.finish(Err(OperationError::Failed(error.into())))
    }

    /// Complete as canceled
    pub fn cancel(&self) -> bool {
        self.finish(Err(OperationError::Canceled))
    }

    /// Whether a completion handler has been attached
    pub fn has_completed_handler(&self) -> bool {
        self.state.lock().completed_attached
    }

    fn finish(&self, outcome: Result<R, OperationError>) -> bool {
        let (handler, status) = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            let status = status_of(&outcome);
            state.outcome = Some(outcome);
            // Progress handler is never called again
            state.progress = None;
            (state.completed.take(), status)
        };
        if let Some(handler) = handler {
            handler(status);
        }
        true
    }
}

fn status_of<R>(outcome: &Result<R, OperationError>) -> AsyncStatus {
    match outcome {
        Ok(_) => AsyncStatus::Completed,
        Err(OperationError::Canceled) => AsyncStatus::Canceled,
        Err(_) => AsyncStatus::Error,
    }
}

impl<R, P> AsyncOperation for CompletionSource<R, P>
where
    R: Clone + Send + 'static,
    P: Send + 'static,
{
    type Output = R;

    fn on_completed(&self, handler: CompletedHandler) -> Result<(), OperationError> {
        let status = {
            let mut state = self.state.lock();
            if state.completed_attached {
                return Err(OperationError::HandlerAlreadySet("completed"));
            }
            state.completed_attached = true;
            match &state.outcome {
                Some(outcome) => status_of(outcome),
                None => {
                    state.completed = Some(handler);
                    return Ok(());
                }
            }
        };
        // Already finished: fire on the attaching thread
        handler(status);
        Ok(())
    }

    fn status(&self) -> AsyncStatus {
        match &self.state.lock().outcome {
            Some(outcome) => status_of(outcome),
            None => AsyncStatus::Started,
        }
    }

    fn results(&self) -> Result<R, OperationError> {
        match &self.state.lock().outcome {
            Some(outcome) => outcome.clone(),
            None => Err(OperationError::NotCompleted),
        }
    }
}

impl<R, P> AsyncOperationWithProgress for CompletionSource<R, P>
where
    R: Clone + Send + 'static,
    P: Send + 'static,
{
    type Progress = P;

    fn on_progress(&self, handler: ProgressHandler<P>) -> Result<(), OperationError> {
        let mut state = self.state.lock();
        if state.progress.is_some() {
            return Err(OperationError::HandlerAlreadySet("progress"));
        }
        if state.outcome.is_none() {
            state.progress = Some(Arc::new(handler));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_complete_fires_handler_once() {
        let source: CompletionSource<i32> = CompletionSource::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        source
            .on_completed(Box::new(move |status: AsyncStatus| {
                assert_eq!(status, AsyncStatus::Completed);
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(source.complete(7));
        assert!(!source.complete(8));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.results(), Ok(7));
    }

    #[test]
    fn test_handler_attached_after_completion_runs_immediately() {
        let source: CompletionSource<&'static str> = CompletionSource::new();
        source.fail("boom");

        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        source
            .on_completed(Box::new(move |status| *s.lock() = Some(status)))
            .unwrap();

        assert_eq!(*seen.lock(), Some(AsyncStatus::Error));
        assert_eq!(source.results(), Err(OperationError::Failed("boom".into())));
    }

    #[test]
    fn test_second_completed_handler_rejected() {
        let source: CompletionSource<i32> = CompletionSource::new();
        source.on_completed(Box::new(|_| {})).unwrap();
        assert_eq!(
            source.on_completed(Box::new(|_| {})),
            Err(OperationError::HandlerAlreadySet("completed"))
        );
    }

    #[test]
    fn test_results_before_completion() {
        let source: CompletionSource<i32> = CompletionSource::new();
        assert_eq!(source.status(), AsyncStatus::Started);
        assert_eq!(source.results(), Err(OperationError::NotCompleted));
    }

    #[test]
    fn test_progress_stops_after_completion() {
        let source: CompletionSource<i32, u32> = CompletionSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        source
            .on_progress(Box::new(move |p| s.lock().push(p)))
            .unwrap();

        assert!(source.report_progress(10));
        assert!(source.report_progress(50));
        source.cancel();
        assert!(!source.report_progress(90));

        assert_eq!(*seen.lock(), vec![10, 50]);
        assert_eq!(source.status(), AsyncStatus::Canceled);
    }
}
