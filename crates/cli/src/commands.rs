//! Subcommand implementations. Results go to stdout as JSON, logs to stderr.

use std::sync::Arc;

use anyhow::{bail, Context};
use dbarchive_core::{ArchiveLog, ChunkedArchiver, JobRunner, Scheduler, TableProgress, TracingLog};
use dbarchive_domain::{AppConfig, SchedulingMode, TableState};
use dbarchive_infra::{DbManager, QueueConfig, SetupService, SqliteArchiveStore, TokioJobQueue};
use serde_json::{json, Value};
use tracing::info;

#[allow(clippy::print_stdout)]
fn emit(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn setup(config: &AppConfig, force: bool) -> anyhow::Result<()> {
    let service = SetupService::new(config.database.clone());
    let report = service.prepare_tables(&config.resolved_tables(), force)?;
    info!(
        archive_created = report.archive_created,
        tables = report.tables.len(),
        "Archive setup finished"
    );
    emit(&serde_json::to_value(&report)?)
}

pub async fn run(config: &AppConfig, force_sync: bool) -> anyhow::Result<()> {
    let store = Arc::new(SqliteArchiveStore::new(Arc::new(DbManager::new(&config.database)?)));
    let log: Arc<dyn ArchiveLog> = Arc::new(TracingLog::new(config.enable_logging));
    let runner: Arc<dyn JobRunner> =
        Arc::new(ChunkedArchiver::new(store.clone(), Arc::clone(&log)));

    let mut scheduler =
        Scheduler::from_config(config, Arc::clone(&runner), log).with_health_check(store);
    if force_sync {
        scheduler = scheduler.with_mode(SchedulingMode::Synchronous);
    }

    let queue = if scheduler.mode() == SchedulingMode::Synchronous {
        None
    } else {
        let queue = Arc::new(TokioJobQueue::new(runner, QueueConfig::from_queueing(&config.queueing)));
        queue.start().await?;
        scheduler = scheduler.with_queue(queue.clone());
        Some(queue)
    };

    let scheduler = Arc::new(scheduler);
    info!(mode = %scheduler.mode(), tables = scheduler.tables().len(), "Starting archival pass");

    let started = {
        let scheduler = Arc::clone(&scheduler);
        tokio::task::spawn_blocking(move || scheduler.start_all())
            .await
            .context("scheduler task panicked")?
    };
    if started.is_ok() {
        scheduler.wait_idle().await;
    }
    if let Some(queue) = queue {
        queue.stop().await?;
    }
    started?;

    let summary = scheduler.summary();
    let unfinished = unfinished_tables(&summary);
    let tables: serde_json::Map<String, Value> = summary
        .iter()
        .map(|(table, progress)| Ok::<_, anyhow::Error>((table.clone(), serde_json::to_value(progress)?)))
        .collect::<anyhow::Result<_>>()?;
    emit(&Value::Object(tables))?;

    if !unfinished.is_empty() {
        bail!("archival did not finish for: {}", unfinished.join(", "));
    }
    Ok(())
}

/// Tables that ended the pass in any state other than `Done`.
fn unfinished_tables(summary: &[(String, TableProgress)]) -> Vec<&str> {
    summary
        .iter()
        .filter(|(_, progress)| progress.state != TableState::Done)
        .map(|(table, _)| table.as_str())
        .collect()
}

pub fn tables(config: &AppConfig) -> anyhow::Result<()> {
    let tables = config
        .resolved_tables()
        .into_iter()
        .map(|(table, settings)| {
            let archive_table = settings.archive_table_name(&table);
            Ok::<_, anyhow::Error>(json!({
                "table": table,
                "archive_table": archive_table,
                "settings": serde_json::to_value(&settings)?,
            }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    emit(&json!({
        "mode": config.queueing.mode().to_string(),
        "same_store": config.database.is_same_store(),
        "tables": tables,
    }))
}

pub fn dry_run(config: &AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(SqliteArchiveStore::new(Arc::new(DbManager::new(&config.database)?)));
    let archiver = ChunkedArchiver::new(store, Arc::new(TracingLog::new(config.enable_logging)));

    let mut counts = Vec::new();
    for (table, settings) in config.resolved_tables() {
        let eligible = archiver
            .eligible_count(&table, &settings)
            .with_context(|| format!("counting eligible rows in {table}"))?;
        let archive_table = settings.archive_table_name(&table);
        counts.push(json!({
            "table": table,
            "archive_table": archive_table,
            "eligible": eligible,
            "runs_needed": eligible.div_ceil(settings.job_quota.max(1)),
        }));
    }
    emit(&Value::Array(counts))
}
