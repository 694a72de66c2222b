//! Table scheduler
//!
//! Decides which table runs next. Every completed run re-enters through
//! [`Scheduler::on_outcome`], which is the only place a follow-up job is
//! chosen: `Continue` resubmits the same table, and in sequential modes a
//! terminal outcome moves on to the next configured table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dbarchive_domain::{
    AppConfig, ArchiveConfig, DbArchiveError, Result, RunOutcome, RunStatus, SchedulingMode,
    TableSequence, TableState,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::group::{DueHooks, GroupHooks, GroupState};
use super::ports::{ArchiveJob, CompletionHook, JobQueue, JobRunner};
use crate::archive::{ArchiveLog, ArchiveStore};

/// Per-table progress within one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableProgress {
    pub state: TableState,
    pub runs: u64,
    pub rows_archived: u64,
    pub last_error: Option<String>,
}

impl TableProgress {
    const fn pending() -> Self {
        Self { state: TableState::Pending, runs: 0, rows_archived: 0, last_error: None }
    }
}

#[derive(Default)]
struct SchedulerState {
    tables: HashMap<String, TableProgress>,
    group: Option<GroupState>,
}

/// Follow-up work decided for one accepted outcome.
struct Transition {
    next: Vec<ArchiveJob>,
    due: DueHooks,
}

/// Drives archival of the configured tables in one of the
/// [`SchedulingMode`]s.
pub struct Scheduler {
    mode: SchedulingMode,
    sequence: TableSequence,
    configs: HashMap<String, ArchiveConfig>,
    runner: Arc<dyn JobRunner>,
    queue: Option<Arc<dyn JobQueue>>,
    store: Option<Arc<dyn ArchiveStore>>,
    log: Arc<dyn ArchiveLog>,
    group_hooks: Mutex<Option<GroupHooks>>,
    state: Mutex<SchedulerState>,
    in_flight: watch::Sender<usize>,
}

impl Scheduler {
    /// `tables` are scheduled in the given order, each with its resolved
    /// settings. A table listed twice is scheduled once, at its first
    /// position and with its first settings.
    pub fn new(
        tables: Vec<(String, ArchiveConfig)>,
        mode: SchedulingMode,
        runner: Arc<dyn JobRunner>,
        log: Arc<dyn ArchiveLog>,
    ) -> Self {
        let sequence = {
            let mut seen = HashSet::with_capacity(tables.len());
            TableSequence::new(tables.iter().map(|(table, _)| table.as_str()).filter(|table| {
                let first = seen.insert(*table);
                if !first {
                    warn!(table, "Table listed more than once; later entries ignored");
                }
                first
            }))
        };
        let mut configs = HashMap::with_capacity(tables.len());
        for (table, config) in tables {
            configs.entry(table).or_insert(config);
        }

        let (in_flight, _) = watch::channel(0);
        Self {
            mode,
            sequence,
            configs,
            runner,
            queue: None,
            store: None,
            log,
            group_hooks: Mutex::new(None),
            state: Mutex::new(SchedulerState::default()),
            in_flight,
        }
    }

    /// Tables, settings and mode taken from the application configuration.
    pub fn from_config(
        config: &AppConfig,
        runner: Arc<dyn JobRunner>,
        log: Arc<dyn ArchiveLog>,
    ) -> Self {
        Self::new(config.resolved_tables(), config.queueing.mode(), runner, log)
    }

    /// Queue used by the sequential, parallel and grouped modes.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Store checked by [`start_all`](Self::start_all) before anything runs.
    #[must_use]
    pub fn with_health_check(mut self, store: Arc<dyn ArchiveStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Hooks for the next grouped pass. Without them the group reports
    /// through the archive log.
    #[must_use]
    pub fn with_group_hooks(self, hooks: GroupHooks) -> Self {
        *self.group_hooks.lock() = Some(hooks);
        self
    }

    /// Override the mode, e.g. to force a synchronous pass.
    #[must_use]
    pub fn with_mode(mut self, mode: SchedulingMode) -> Self {
        self.mode = mode;
        self
    }

    pub const fn mode(&self) -> SchedulingMode {
        self.mode
    }

    pub const fn tables(&self) -> &TableSequence {
        &self.sequence
    }

    pub fn table_state(&self, table: &str) -> Option<TableState> {
        self.state.lock().tables.get(table).map(|progress| progress.state)
    }

    pub fn progress(&self, table: &str) -> Option<TableProgress> {
        self.state.lock().tables.get(table).cloned()
    }

    /// Progress of every configured table, in configuration order.
    pub fn summary(&self) -> Vec<(String, TableProgress)> {
        let state = self.state.lock();
        self.sequence
            .iter()
            .filter_map(|table| {
                state.tables.get(table).map(|progress| (table.to_string(), progress.clone()))
            })
            .collect()
    }

    /// Jobs submitted and not yet completed, plus one while `start_all` is
    /// still dispatching.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Start a scheduling pass over every configured table.
    ///
    /// In synchronous mode this returns once every table is terminal. In the
    /// queued modes it returns after the initial submissions; use
    /// [`wait_idle`](Self::wait_idle) to wait for the chains to finish.
    ///
    /// # Errors
    /// - `Configuration` when the store health check fails or a queued mode
    ///   has no queue. Nothing has run in that case.
    /// - `InvalidInput` when a previous pass is still in flight.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub fn start_all(self: &Arc<Self>) -> Result<()> {
        if let Some(store) = &self.store {
            store.health_check().map_err(|err| {
                DbArchiveError::Configuration(format!("archive store health check failed: {err}"))
            })?;
        }

        if self.mode != SchedulingMode::Synchronous && self.queue.is_none() {
            return Err(DbArchiveError::Configuration(format!(
                "{} scheduling requires a job queue",
                self.mode
            )));
        }

        let claimed = self.in_flight.send_if_modified(|count| {
            if *count == 0 {
                *count = 1;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(DbArchiveError::InvalidInput(
                "a scheduling pass is already in flight".to_string(),
            ));
        }

        self.reset();
        info!(tables = self.sequence.len(), "Starting archival pass");

        match self.mode {
            SchedulingMode::Synchronous => self.run_synchronously(),
            SchedulingMode::Sequential => {
                if let Some(first) = self.sequence.first() {
                    self.dispatch(self.job_for(first));
                }
            }
            SchedulingMode::Parallel => {
                for table in self.sequence.iter() {
                    self.dispatch(self.job_for(table));
                }
            }
            SchedulingMode::Grouped => self.start_group(),
        }

        self.release();
        Ok(())
    }

    /// Resolves once no submitted job is outstanding.
    pub async fn wait_idle(&self) {
        let mut receiver = self.in_flight.subscribe();
        if receiver.wait_for(|count| *count == 0).await.is_err() {
            debug!("In-flight counter closed while waiting for idle");
        }
    }

    /// Re-entry point for every completed run.
    ///
    /// Outcomes for tables that are not currently running are logged and
    /// ignored.
    pub fn on_outcome(self: &Arc<Self>, outcome: RunOutcome) {
        let Some(transition) = self.transition(&outcome) else {
            return;
        };
        transition.due.fire();
        for job in transition.next {
            self.dispatch(job);
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.tables =
            self.sequence.iter().map(|table| (table.to_string(), TableProgress::pending())).collect();
        state.group = None;
    }

    fn release(&self) {
        self.in_flight.send_modify(|count| *count = count.saturating_sub(1));
    }

    fn job_for(&self, table: &str) -> ArchiveJob {
        ArchiveJob::new(table, self.configs.get(table).cloned().unwrap_or_default())
    }

    fn start_group(self: &Arc<Self>) {
        let hooks = self
            .group_hooks
            .lock()
            .take()
            .unwrap_or_else(|| GroupHooks::logging(Arc::clone(&self.log)));
        let mut group = GroupState::new(self.sequence.iter(), hooks);
        debug!(group = %group.id(), members = self.sequence.len(), "Group created");
        let due = group.settle_if_empty();
        self.state.lock().group = Some(group);
        due.fire();

        for table in self.sequence.iter() {
            self.dispatch(self.job_for(table));
        }
    }

    fn run_synchronously(&self) {
        let mut pending: VecDeque<ArchiveJob> =
            self.sequence.first().map(|table| self.job_for(table)).into_iter().collect();

        while let Some(job) = pending.pop_front() {
            if !self.mark_running(&job.table) {
                continue;
            }
            let outcome = self.runner.run(&job.table, &job.config);
            if let Some(transition) = self.transition(&outcome) {
                transition.due.fire();
                pending.extend(transition.next);
            }
        }
    }

    fn dispatch(self: &Arc<Self>, job: ArchiveJob) {
        if !self.mark_running(&job.table) {
            return;
        }

        let Some(queue) = self.queue.as_ref() else {
            let err = DbArchiveError::Configuration("no job queue configured".to_string());
            self.on_outcome(RunOutcome::failed(job.table, job.config, err.to_string()));
            return;
        };

        self.in_flight.send_modify(|count| *count += 1);
        let scheduler = Arc::clone(self);
        let hook: CompletionHook = Box::new(move |outcome| {
            scheduler.on_outcome(outcome);
            scheduler.release();
        });

        let (table, config) = (job.table.clone(), job.config.clone());
        if let Err(err) = queue.submit(job, hook) {
            warn!(table = %table, error = %err, "Job submission rejected");
            self.on_outcome(RunOutcome::failed(table, config, err.to_string()));
            self.release();
        }
    }

    fn mark_running(&self, table: &str) -> bool {
        let mut state = self.state.lock();
        match state.tables.get_mut(table) {
            Some(progress)
                if matches!(progress.state, TableState::Pending | TableState::Continuing) =>
            {
                progress.state = TableState::Running;
                progress.runs += 1;
                true
            }
            Some(progress) => {
                warn!(table, state = %progress.state, "Table not runnable; submission skipped");
                false
            }
            None => {
                warn!(table, "Table is not configured; submission skipped");
                false
            }
        }
    }

    /// Record `outcome` and decide what runs next. `None` when the outcome
    /// was rejected.
    fn transition(&self, outcome: &RunOutcome) -> Option<Transition> {
        let mut state = self.state.lock();
        let Some(progress) = state.tables.get_mut(&outcome.table) else {
            warn!(table = %outcome.table, "Outcome for unknown table ignored");
            return None;
        };
        if progress.state != TableState::Running {
            warn!(
                table = %outcome.table,
                state = %progress.state,
                "Outcome for a table that is not running ignored"
            );
            return None;
        }

        progress.state = TableState::from(outcome.status);
        progress.rows_archived += outcome.rows_archived;
        if outcome.error.is_some() {
            progress.last_error.clone_from(&outcome.error);
        }

        let mut transition = Transition { next: Vec::new(), due: DueHooks::default() };
        match outcome.status {
            RunStatus::Continue => {
                debug!(table = %outcome.table, rows = outcome.rows_archived, "Resubmitting table");
                transition.next.push(ArchiveJob::new(outcome.table.clone(), outcome.config.clone()));
            }
            RunStatus::Done | RunStatus::Failed => {
                let failure = outcome
                    .is_failed()
                    .then(|| outcome.error.clone().unwrap_or_else(|| "run failed".to_string()));
                if let Some(error) = &failure {
                    warn!(table = %outcome.table, error = %error, "Table archival failed");
                } else {
                    info!(table = %outcome.table, "Table archival finished");
                }

                match self.mode {
                    SchedulingMode::Synchronous | SchedulingMode::Sequential => {
                        if let Some(next) = self.sequence.next_after(&outcome.table) {
                            transition.next.push(self.job_for(next));
                        }
                    }
                    SchedulingMode::Parallel => {}
                    SchedulingMode::Grouped => {
                        if let Some(group) = state.group.as_mut() {
                            transition.due = group.record_terminal(&outcome.table, failure.as_deref());
                        }
                    }
                }
            }
        }
        Some(transition)
    }
}
