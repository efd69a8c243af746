//! Single-shot async operation contracts
//!
//! An async operation runs once. It reports completion exactly once and,
//! for the progress variant, zero or more progress values strictly before
//! completion. Attaching a handler never restarts the work.

use crate::error::OperationError;

/// Terminal or in-flight status of an async operation
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AsyncStatus {
    /// Still running
    Started,
    /// Finished with results available
    Completed,
    /// Canceled by its producer
    Canceled,
    /// Finished with an error
    Error,
}

impl AsyncStatus {
    /// Whether the operation has reached a terminal status
    pub fn is_terminal(self) -> bool {
        !matches!(self, AsyncStatus::Started)
    }
}

/// Handler invoked once when an operation reaches a terminal status.
pub type CompletedHandler = Box<dyn FnOnce(AsyncStatus) + Send + 'static>;

/// Handler invoked for every progress report.
pub type ProgressHandler<P> = Box<dyn Fn(P) + Send + Sync + 'static>;

/// A single-shot unit of work with a one-time completion notification.
///
/// # Contract
///
/// - `on_completed` accepts one handler. Attaching after completion invokes
///   the handler immediately on the calling thread.
/// - `results` is only meaningful once the status is terminal; reading it
///   may fail, which consumers surface as an extraction failure.
pub trait AsyncOperation: Send + Sync + 'static {
    /// Value produced by a successful operation
    type Output: Send + 'static;

    /// Attach the completion handler
    fn on_completed(&self, handler: CompletedHandler) -> Result<(), OperationError>;

    /// Current status
    fn status(&self) -> AsyncStatus;

    /// Read the results of a completed operation
    fn results(&self) -> Result<Self::Output, OperationError>;
}

/// An async operation that also reports interim progress.
pub trait AsyncOperationWithProgress: AsyncOperation {
    /// Interim progress value
    type Progress: Send + 'static;

    /// Attach the progress handler
    ///
    /// Progress reports arriving before a handler is attached are not replayed.
    fn on_progress(&self, handler: ProgressHandler<Self::Progress>) -> Result<(), OperationError>;
}
