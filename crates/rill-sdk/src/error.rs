//! Error types shared by operation, event and dispatch contracts

/// Failure reported by an async operation.
///
/// Raised while reading the result of a completed operation, or while
/// wiring a handler onto one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// The operation was canceled by its producer
    #[error("Operation was canceled")]
    Canceled,

    /// The operation completed with an error
    #[error("Operation failed: {0}")]
    Failed(String),

    /// Results were read before the operation completed
    #[error("Results are not available until the operation completes")]
    NotCompleted,

    /// A handler of this kind was already attached
    #[error("A {0} handler is already attached to this operation")]
    HandlerAlreadySet(&'static str),
}

/// Failure raised by a dispatch queue or thread pool refusing work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The queue or pool has shut down
    #[error("Dispatcher is shut down")]
    Closed,
}

/// Failure raised while tearing down a registration or timer.
///
/// Consumers of these contracts discard these errors on their disposal
/// paths; they exist so hosts can report what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisposalError {
    /// The token does not name a live registration
    #[error("No handler registered for token {0}")]
    UnknownToken(u64),

    /// The owner of the timer or registration is gone
    #[error("Owner was released before disposal")]
    Released,

    /// Host-specific failure
    #[error("{0}")]
    Failed(String),
}

impl From<String> for DisposalError {
    fn from(s: String) -> Self {
        DisposalError::Failed(s)
    }
}

impl From<&str> for DisposalError {
    fn from(s: &str) -> Self {
        DisposalError::Failed(s.to_string())
    }
}
