//! Results of a single archival run and the per-table lifecycle.

use serde::{Deserialize, Serialize};

use crate::config::ArchiveConfig;
use crate::impl_status_conversions;

/// What the scheduler should do after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Quota exhausted before the eligible set; resubmit the same table.
    Continue,
    /// No eligible rows remain beyond this run.
    Done,
    /// A batch failed and was rolled back; the chain stops here.
    Failed,
}

impl_status_conversions!(RunStatus {
    Continue => "continue",
    Done => "done",
    Failed => "failed",
});

/// Lifecycle of one table within a single scheduling pass.
///
/// `Pending -> Running -> {Continuing -> Running | Done | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Pending,
    Running,
    Continuing,
    Done,
    Failed,
}

impl_status_conversions!(TableState {
    Pending => "pending",
    Running => "running",
    Continuing => "continuing",
    Done => "done",
    Failed => "failed",
});

impl TableState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl From<RunStatus> for TableState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Continue => Self::Continuing,
            RunStatus::Done => Self::Done,
            RunStatus::Failed => Self::Failed,
        }
    }
}

/// Report produced by one invocation of the archiver for one table.
///
/// A `Continue` outcome carries everything needed to resubmit the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub table: String,
    pub config: ArchiveConfig,
    pub rows_archived: u64,
    pub batches_completed: u64,
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn done(table: impl Into<String>, config: ArchiveConfig) -> Self {
        Self::new(RunStatus::Done, table, config)
    }

    pub fn continue_with(table: impl Into<String>, config: ArchiveConfig) -> Self {
        Self::new(RunStatus::Continue, table, config)
    }

    pub fn failed(table: impl Into<String>, config: ArchiveConfig, error: impl Into<String>) -> Self {
        let mut outcome = Self::new(RunStatus::Failed, table, config);
        outcome.error = Some(error.into());
        outcome
    }

    fn new(status: RunStatus, table: impl Into<String>, config: ArchiveConfig) -> Self {
        Self {
            status,
            table: table.into(),
            config,
            rows_archived: 0,
            batches_completed: 0,
            error: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, rows_archived: u64, batches_completed: u64) -> Self {
        self.rows_archived = rows_archived;
        self.batches_completed = batches_completed;
        self
    }

    pub fn is_continue(&self) -> bool {
        self.status == RunStatus::Continue
    }

    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }
}
