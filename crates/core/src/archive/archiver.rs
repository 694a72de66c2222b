//! Chunked archival of one table
//!
//! A run counts the eligible rows once, then moves them in batches of at
//! most `batch_size` rows, each in its own transaction, until either the
//! per-run quota or the eligible snapshot is used up. The run never
//! resubmits itself; it reports [`RunStatus::Continue`] and leaves the
//! decision to the scheduler.
//!
//! [`RunStatus::Continue`]: dbarchive_domain::RunStatus::Continue

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dbarchive_domain::{ArchiveConfig, DbArchiveError, Result, RunOutcome, SqlValue};
use tracing::{debug, instrument, warn};

use super::filter::EligibilityFilter;
use super::log::ArchiveLog;
use super::ports::{ArchiveStore, BatchTransaction};

/// Source of "now" for cutoff computation.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// State of one in-progress run. Created at the start of
/// [`ChunkedArchiver::run`] and dropped at the end.
#[derive(Debug, Clone)]
pub struct ArchivalRun {
    pub table: String,
    pub archive_table: String,
    pub config: ArchiveConfig,
    pub cutoff: DateTime<Utc>,
    pub eligible_count: u64,
    pub batches_completed: u64,
    pub rows_moved: u64,
}

impl ArchivalRun {
    fn new(table: &str, config: &ArchiveConfig, now: DateTime<Utc>) -> Self {
        Self {
            table: table.to_string(),
            archive_table: config.archive_table_name(table),
            config: config.clone(),
            cutoff: config.cutoff(now),
            eligible_count: 0,
            batches_completed: 0,
            rows_moved: 0,
        }
    }

    fn filter(&self) -> EligibilityFilter {
        EligibilityFilter::new(
            self.table.clone(),
            &self.config,
            self.config.date_format.encode(self.cutoff),
        )
    }

    /// Batch size, with zero treated as one row.
    fn batch_size(&self) -> u64 {
        self.config.batch_size.max(1)
    }

    /// Per-run quota, with zero treated as one row.
    fn job_quota(&self) -> u64 {
        self.config.job_quota.max(1)
    }

    /// `ceil(min(job_quota, eligible_count) / batch_size)`
    pub fn planned_batches(&self) -> u64 {
        self.job_quota().min(self.eligible_count).div_ceil(self.batch_size())
    }

    /// Rows the next batch may take without exceeding the quota.
    fn next_limit(&self) -> u64 {
        self.batch_size().min(self.job_quota().saturating_sub(self.rows_moved))
    }

    /// Rows this run is allowed to move: every planned batch full, capped by
    /// the quota.
    pub fn capacity(&self) -> u64 {
        self.planned_batches().saturating_mul(self.batch_size()).min(self.job_quota())
    }

    /// True when the eligible snapshot is larger than this run may move.
    pub fn has_remainder(&self) -> bool {
        self.eligible_count > self.capacity()
    }

    fn outcome_done(&self) -> RunOutcome {
        RunOutcome::done(self.table.clone(), self.config.clone())
            .with_progress(self.rows_moved, self.batches_completed)
    }

    fn outcome_continue(&self) -> RunOutcome {
        RunOutcome::continue_with(self.table.clone(), self.config.clone())
            .with_progress(self.rows_moved, self.batches_completed)
    }

    fn outcome_failed(&self, error: &DbArchiveError) -> RunOutcome {
        RunOutcome::failed(self.table.clone(), self.config.clone(), error.to_string())
            .with_progress(self.rows_moved, self.batches_completed)
    }
}

/// Executes archival runs against an [`ArchiveStore`].
pub struct ChunkedArchiver {
    store: Arc<dyn ArchiveStore>,
    log: Arc<dyn ArchiveLog>,
    clock: Clock,
}

impl ChunkedArchiver {
    pub fn new(store: Arc<dyn ArchiveStore>, log: Arc<dyn ArchiveLog>) -> Self {
        Self { store, log, clock: Arc::new(Utc::now) }
    }

    /// Replace the wall clock, mainly for deterministic cutoffs in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn ArchiveStore> {
        &self.store
    }

    /// Rows that a run started now would consider eligible. Read-only.
    ///
    /// # Errors
    /// `Configuration` when a condition is unusable; otherwise propagates
    /// the store's count failure.
    pub fn eligible_count(&self, table: &str, config: &ArchiveConfig) -> Result<u64> {
        config.check_conditions()?;
        let run = ArchivalRun::new(table, config, (self.clock)());
        self.store.count_eligible(&run.filter())
    }

    /// Run one archival pass for `table`.
    ///
    /// Failures are reported through the returned outcome and the error log;
    /// batches committed before a failure stay committed.
    #[instrument(skip_all, fields(table = %table))]
    pub fn run(&self, table: &str, config: &ArchiveConfig) -> RunOutcome {
        let mut run = ArchivalRun::new(table, config, (self.clock)());
        self.log.info(&format!("Archiving table: {table}"));

        if let Err(err) = config.check_conditions() {
            self.log.error(&format!("Not archiving {table}: {err}"));
            return run.outcome_failed(&err);
        }

        let filter = run.filter();
        run.eligible_count = match self.store.count_eligible(&filter) {
            Ok(count) => count,
            Err(err) => {
                let err = DbArchiveError::BatchFailure(format!(
                    "counting eligible rows in {table} failed: {err}"
                ));
                self.log.error(&err.to_string());
                return run.outcome_failed(&err);
            }
        };

        let planned = run.planned_batches();
        debug!(eligible = run.eligible_count, batches = planned, "Planned archival run");

        for batch in 0..planned {
            let limit = run.next_limit();
            match self.move_batch(&filter, &run.archive_table, limit) {
                Ok(0) => {
                    debug!(batch, "Eligible rows drained before the planned batches ran out");
                    self.finish_log(&run);
                    return run.outcome_done();
                }
                Ok(rows) => {
                    run.batches_completed += 1;
                    run.rows_moved += rows;
                    debug!(batch, rows, total = run.rows_moved, "Batch committed");
                }
                Err(err) => {
                    let err = DbArchiveError::BatchFailure(format!(
                        "table {table}, batch {}: {err}",
                        batch + 1
                    ));
                    self.log.error(&err.to_string());
                    return run.outcome_failed(&err);
                }
            }
        }

        if run.has_remainder() {
            self.log.info(&format!(
                "Archived {} records for table {table}; more remain, continuing",
                run.rows_moved
            ));
            run.outcome_continue()
        } else {
            self.finish_log(&run);
            run.outcome_done()
        }
    }

    fn finish_log(&self, run: &ArchivalRun) {
        if run.batches_completed > 0 {
            self.log.info(&format!("Archived {} records for table {}", run.rows_moved, run.table));
        }
        self.log.info(&format!("Finished archiving {}", run.table));
    }

    /// Move at most `limit` rows in one transaction. Returns the number of
    /// rows moved; any error leaves the transaction rolled back.
    fn move_batch(&self, filter: &EligibilityFilter, archive_table: &str, limit: u64) -> Result<u64> {
        let mut tx = self.store.begin_batch()?;
        match stage_batch(tx.as_mut(), filter, archive_table, limit) {
            Ok(rows) => {
                tx.commit()?;
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "Rollback after batch failure also failed");
                }
                Err(err)
            }
        }
    }
}

fn stage_batch(
    tx: &mut dyn BatchTransaction,
    filter: &EligibilityFilter,
    archive_table: &str,
    limit: u64,
) -> Result<u64> {
    let rows = tx.select_eligible(filter, limit)?;
    if rows.is_empty() {
        return Ok(0);
    }

    let key_column = filter.primary_key_column.as_str();
    let keys = rows
        .iter()
        .map(|row| {
            row.get(key_column).filter(|value| !value.is_null()).cloned().ok_or_else(|| {
                DbArchiveError::BatchFailure(format!(
                    "selected row has no value for key column {key_column}"
                ))
            })
        })
        .collect::<Result<Vec<SqlValue>>>()?;

    let inserted = tx.insert_into_archive(archive_table, &rows)?;
    if inserted != rows.len() {
        return Err(DbArchiveError::BatchFailure(format!(
            "inserted {inserted} of {} rows into {archive_table}",
            rows.len()
        )));
    }

    let deleted = tx.delete_from_source(&filter.table, key_column, &keys)?;
    if deleted != rows.len() {
        return Err(DbArchiveError::BatchFailure(format!(
            "deleted {deleted} of {} selected rows from {}",
            rows.len(),
            filter.table
        )));
    }

    Ok(rows.len() as u64)
}
