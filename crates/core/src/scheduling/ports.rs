//! Port interfaces for executing archival work

use dbarchive_domain::{ArchiveConfig, Result, RunOutcome};
use serde::{Deserialize, Serialize};

use crate::archive::ChunkedArchiver;

/// One unit of work: archive one run's worth of `table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub table: String,
    pub config: ArchiveConfig,
}

impl ArchiveJob {
    pub fn new(table: impl Into<String>, config: ArchiveConfig) -> Self {
        Self { table: table.into(), config }
    }
}

/// Invoked with the outcome of a submitted job.
pub type CompletionHook = Box<dyn FnOnce(RunOutcome) + Send + 'static>;

/// Executes a single job to completion. Blocking.
pub trait JobRunner: Send + Sync {
    fn run(&self, table: &str, config: &ArchiveConfig) -> RunOutcome;
}

impl JobRunner for ChunkedArchiver {
    fn run(&self, table: &str, config: &ArchiveConfig) -> RunOutcome {
        Self::run(self, table, config)
    }
}

/// Asynchronous job execution.
pub trait JobQueue: Send + Sync {
    /// Accept `job` for execution.
    ///
    /// When this returns `Ok`, `on_complete` is invoked exactly once with the
    /// job's outcome. When it returns an error the job was not accepted and
    /// `on_complete` is dropped without being called.
    fn submit(&self, job: ArchiveJob, on_complete: CompletionHook) -> Result<()>;
}
