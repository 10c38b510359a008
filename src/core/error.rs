//! Error types for queues and their combinators.

use std::sync::Arc;
use thiserror::Error;

/// The main error type for queue operations.
///
/// Protocol violations are raised synchronously by the call that commits
/// them. Visitor failures are either returned from the active drain or, for
/// combinators, carried downstream through the derived queue.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// An item was pushed after the queue was ended
    #[error("cannot push to an ended queue")]
    PushAfterEnd,

    /// `end` was called on a queue that had already ended
    #[error("queue already ended")]
    AlreadyEnded,

    /// A second drain was started on the same queue
    #[error("queue already consumed")]
    AlreadyConsumed,

    /// A split classifier routed an item to a lane other than 0 or 1
    #[error("invalid lane {0}, expected 0 or 1")]
    InvalidLane(usize),

    /// `fork` was asked for fewer than one derived queue
    #[error("fork count must be at least 1, got {0}")]
    InvalidCloneCount(usize),

    /// `batch` was asked for groups of zero items
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    /// A visitor or transform failed
    #[error("visitor error: {0}")]
    Visitor(Arc<dyn std::error::Error + Send + Sync>),

    /// A spawned task panicked or was aborted
    #[error("task failed: {0}")]
    Task(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Create a visitor error from any error type
    pub fn visitor<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Visitor(Arc::new(error))
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Whether this error is a protocol violation rather than a runtime failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::PushAfterEnd
                | Error::AlreadyEnded
                | Error::AlreadyConsumed
                | Error::InvalidLane(_)
                | Error::InvalidCloneCount(_)
                | Error::InvalidBatchSize(_)
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into visitor errors
pub trait IntoVisitorError<T> {
    fn into_visitor_error(self) -> Result<T>;
}

impl<T, E> IntoVisitorError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_visitor_error(self) -> Result<T> {
        self.map_err(Error::visitor)
    }
}
