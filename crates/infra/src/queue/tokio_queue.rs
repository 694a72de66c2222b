//! Tokio-backed job queue
//!
//! A fixed set of worker tasks pulls jobs from one unbounded channel. Each
//! job runs on the blocking pool, and its completion hook is called exactly
//! once: with the run's outcome, with a `Failed` outcome if the run
//! panicked, or with a `Failed` outcome if the queue stopped before the job
//! was picked up.
//!
//! Lifecycle follows the usual start/stop shape: a cancellation token for the
//! workers, tracked join handles, and a bounded wait on shutdown.

use std::sync::Arc;
use std::time::Duration;

use dbarchive_core::{ArchiveJob, CompletionHook, JobQueue, JobRunner};
use dbarchive_domain::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_WORKERS};
use dbarchive_domain::{QueueingConfig, Result, RunOutcome, RunStatus};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::{QueueError, QueueResult};

type JobReceiver = Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

/// Queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Worker tasks, and so the most jobs running at once.
    pub workers: usize,
    /// Runs per job, counting the first. Only `Failed` runs are retried.
    pub max_attempts: u32,
    /// How long `stop` waits for each worker.
    pub shutdown_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_QUEUE_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl QueueConfig {
    pub fn from_queueing(queueing: &QueueingConfig) -> Self {
        Self {
            workers: queueing.workers.max(1),
            max_attempts: queueing.max_attempts.max(1),
            ..Self::default()
        }
    }
}

struct QueuedJob {
    job: ArchiveJob,
    on_complete: CompletionHook,
}

/// Job queue running [`JobRunner`] units on Tokio workers.
pub struct TokioJobQueue {
    runner: Arc<dyn JobRunner>,
    config: QueueConfig,
    sender: SyncMutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    receiver: SyncMutex<Option<JobReceiver>>,
    cancellation_token: SyncMutex<CancellationToken>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TokioJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioJobQueue")
            .field("config", &self.config)
            .field("accepting", &self.sender.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl TokioJobQueue {
    pub fn new(runner: Arc<dyn JobRunner>, config: QueueConfig) -> Self {
        Self {
            runner,
            config,
            sender: SyncMutex::new(None),
            receiver: SyncMutex::new(None),
            cancellation_token: SyncMutex::new(CancellationToken::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub const fn config(&self) -> QueueConfig {
        self.config
    }

    /// Spawn the workers and start accepting jobs.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::AlreadyRunning` if workers are already active.
    #[instrument(skip(self), fields(workers = self.config.workers))]
    pub async fn start(&self) -> QueueResult<()> {
        let mut workers = self.workers.lock().await;
        if workers.iter().any(|handle| !handle.is_finished()) {
            return Err(QueueError::AlreadyRunning);
        }
        workers.clear();

        // Fresh token so the queue can be restarted after stop.
        let cancel = CancellationToken::new();
        *self.cancellation_token.lock() = cancel.clone();

        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: JobReceiver = Arc::new(Mutex::new(receiver));

        for worker in 0..self.config.workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let runner = Arc::clone(&self.runner);
            let cancel = cancel.clone();
            let max_attempts = self.config.max_attempts;
            workers.push(tokio::spawn(async move {
                Self::worker_loop(worker, receiver, runner, max_attempts, cancel).await;
            }));
        }

        *self.receiver.lock() = Some(receiver);
        *self.sender.lock() = Some(sender);

        info!("Job queue started");
        Ok(())
    }

    /// Stop accepting jobs, let running jobs finish and fail the rest.
    ///
    /// Jobs still waiting in the channel have their hooks invoked with a
    /// `Failed` outcome so every accepted submission is answered.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::NotRunning` if the queue was never started, or
    /// `QueueError::Timeout` / `QueueError::TaskJoinFailed` if a worker did
    /// not shut down cleanly.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> QueueResult<()> {
        let Some(sender) = self.sender.lock().take() else {
            return Err(QueueError::NotRunning);
        };
        drop(sender);

        info!("Stopping job queue");
        self.cancellation_token.lock().cancel();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        let mut result = Ok(());
        for handle in handles {
            match tokio::time::timeout(self.config.shutdown_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Queue worker panicked: {}", e);
                    result = Err(QueueError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Queue worker did not complete within timeout");
                    result =
                        Err(QueueError::Timeout { seconds: self.config.shutdown_timeout.as_secs() });
                }
            }
        }

        let receiver = self.receiver.lock().take();
        if let Some(receiver) = receiver {
            let mut receiver = receiver.lock().await;
            while let Ok(queued) = receiver.try_recv() {
                debug!(table = %queued.job.table, "failing job left in queue");
                let QueuedJob { job, on_complete } = queued;
                on_complete(RunOutcome::failed(
                    job.table,
                    job.config,
                    "job queue stopped before the job ran",
                ));
            }
        }

        info!("Job queue stopped");
        result
    }

    /// True while workers are alive and submissions are accepted.
    pub async fn is_running(&self) -> bool {
        if self.sender.lock().is_none() {
            return false;
        }
        self.workers.lock().await.iter().any(|handle| !handle.is_finished())
    }

    async fn worker_loop(
        worker: usize,
        receiver: JobReceiver,
        runner: Arc<dyn JobRunner>,
        max_attempts: u32,
        cancel: CancellationToken,
    ) {
        debug!(worker, "queue worker started");
        loop {
            let next = {
                let mut receiver = receiver.lock().await;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    job = receiver.recv() => job,
                }
            };
            let Some(QueuedJob { job, on_complete }) = next else {
                break;
            };

            let outcome = Self::execute(&runner, &job, max_attempts).await;
            on_complete(outcome);
        }
        debug!(worker, "queue worker stopped");
    }

    /// Runs `job`, retrying failures. Rows committed by a failed attempt stay
    /// archived, so the reported progress covers every attempt.
    async fn execute(runner: &Arc<dyn JobRunner>, job: &ArchiveJob, max_attempts: u32) -> RunOutcome {
        let attempts = max_attempts.max(1);
        let mut attempt = 1;
        let (mut rows, mut batches) = (0_u64, 0_u64);
        loop {
            let outcome = Self::run_once(runner, job).await;
            rows = rows.saturating_add(outcome.rows_archived);
            batches = batches.saturating_add(outcome.batches_completed);
            if outcome.status != RunStatus::Failed || attempt >= attempts {
                return outcome.with_progress(rows, batches);
            }
            warn!(
                table = %job.table,
                attempt,
                error = outcome.error.as_deref().unwrap_or_default(),
                "archival run failed; retrying"
            );
            attempt += 1;
        }
    }

    async fn run_once(runner: &Arc<dyn JobRunner>, job: &ArchiveJob) -> RunOutcome {
        let runner = Arc::clone(runner);
        let unit = job.clone();
        match tokio::task::spawn_blocking(move || runner.run(&unit.table, &unit.config)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(table = %job.table, "archival run did not complete: {}", e);
                RunOutcome::failed(job.table.clone(), job.config.clone(), format!("Task join failed: {e}"))
            }
        }
    }
}

impl JobQueue for TokioJobQueue {
    fn submit(&self, job: ArchiveJob, on_complete: CompletionHook) -> Result<()> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(QueueError::NotRunning.into());
        };
        debug!(table = %job.table, "job submitted");
        sender.send(QueuedJob { job, on_complete }).map_err(|_| QueueError::Closed.into())
    }
}
