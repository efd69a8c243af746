//! Error types for streams and construction-time configuration

use rill_sdk::OperationError;

/// Terminal error carried by a stream.
///
/// `Clone` so that one terminal notification can reach every subscriber of
/// a shared stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Reading the results of a completed operation failed
    #[error("Failed to read operation results: {0}")]
    Extraction(#[from] OperationError),

    /// Attaching the completion or progress handler to an operation failed
    #[error("Failed to attach operation handler: {0}")]
    Registration(OperationError),

    /// Error raised by a user-created stream
    #[error("{0}")]
    Other(String),
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::Other(s)
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        StreamError::Other(s.to_string())
    }
}

/// Failure to construct a scheduler or host.
///
/// Reported synchronously by constructors, never through a stream.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A UI scheduler was requested on a thread with no current dispatch queue
    #[error("No dispatch queue is current on this thread")]
    NoDispatcher,

    /// A host thread could not be spawned
    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Name of the thread that failed to start
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Configuration text could not be parsed
    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// Result of a construction-time operation
pub type ConfigResult<T> = Result<T, ConfigError>;
