//! Hand-cranked `JobQueue`: jobs wait until the test runs them.

use std::collections::VecDeque;

use dbarchive_core::{ArchiveJob, CompletionHook, JobQueue, JobRunner};
use dbarchive_domain::{DbArchiveError, Result, RunOutcome};
use parking_lot::Mutex;

#[derive(Default)]
pub struct ManualQueue {
    pending: Mutex<VecDeque<(ArchiveJob, CompletionHook)>>,
    history: Mutex<Vec<String>>,
    closed: Mutex<bool>,
}

impl ManualQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every further submission.
    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    /// Tables in submission order, including resubmissions.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn pending_tables(&self) -> Vec<String> {
        self.pending.lock().iter().map(|(job, _)| job.table.clone()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run the oldest pending job with `runner`. Returns its outcome, or
    /// `None` when nothing is pending.
    pub fn run_next(&self, runner: &dyn JobRunner) -> Option<RunOutcome> {
        let (job, hook) = self.pending.lock().pop_front()?;
        let outcome = runner.run(&job.table, &job.config);
        hook(outcome.clone());
        Some(outcome)
    }

    /// Complete the oldest pending job with a canned outcome.
    pub fn complete_next_with(&self, outcome: impl FnOnce(&ArchiveJob) -> RunOutcome) -> bool {
        let Some((job, hook)) = self.pending.lock().pop_front() else {
            return false;
        };
        hook(outcome(&job));
        true
    }

    /// Run jobs until the queue is empty; returns every outcome.
    pub fn drain(&self, runner: &dyn JobRunner) -> Vec<RunOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.run_next(runner) {
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl JobQueue for ManualQueue {
    fn submit(&self, job: ArchiveJob, on_complete: CompletionHook) -> Result<()> {
        if *self.closed.lock() {
            return Err(DbArchiveError::Queue("queue is closed".into()));
        }
        self.history.lock().push(job.table.clone());
        self.pending.lock().push_back((job, on_complete));
        Ok(())
    }
}
