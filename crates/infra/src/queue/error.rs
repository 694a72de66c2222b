//! Job queue error types

use dbarchive_domain::DbArchiveError;
use thiserror::Error;

use crate::errors::InfraError;

/// Queue-specific errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue is already running
    #[error("Job queue already running")]
    AlreadyRunning,

    /// Queue is not running
    #[error("Job queue not running")]
    NotRunning,

    /// Workers are gone; the job was not accepted
    #[error("Job queue closed")]
    Closed,

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<QueueError> for InfraError {
    fn from(err: QueueError) -> Self {
        Self(DbArchiveError::Queue(err.to_string()))
    }
}

impl From<QueueError> for DbArchiveError {
    fn from(err: QueueError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
