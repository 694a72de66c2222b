//! Error types used throughout the workspace

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for dbarchive
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DbArchiveError {
    /// Archive store unreachable or settings unusable. Fatal before any run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single batch failed and was rolled back.
    #[error("Batch failure: {0}")]
    BatchFailure(String),

    /// A member of a grouped submission failed.
    #[error("Group failure: {0}")]
    GroupFailure(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbArchiveError {
    /// Stable label suitable for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::BatchFailure(_) => "batch_failure",
            Self::GroupFailure(_) => "group_failure",
            Self::Database(_) => "database",
            Self::Queue(_) => "queue",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for dbarchive operations
pub type Result<T> = std::result::Result<T, DbArchiveError>;
