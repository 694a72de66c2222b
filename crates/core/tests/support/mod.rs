//! Shared test helpers for `dbarchive-core` integration tests.
//!
//! In-memory implementations of the core ports so archiver and scheduler
//! tests can focus on behaviour instead of storage plumbing.

#![allow(dead_code)]

pub mod log;
pub mod queue;
pub mod store;

use chrono::{DateTime, TimeZone, Utc};
use dbarchive_domain::{ArchiveConfig, ArchiveRow};

/// Fixed "now" used by every test: 2025-01-01 00:00:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Row dated well before the default 365-day cutoff.
pub fn old_row(id: i64, status: &str) -> ArchiveRow {
    row_at(id, &format!("2020-01-01 00:{:02}:{:02}", (id / 60) % 60, id % 60), status)
}

/// Row dated after the default cutoff.
pub fn recent_row(id: i64) -> ArchiveRow {
    row_at(id, "2024-12-01 00:00:00", "open")
}

pub fn row_at(id: i64, created_at: &str, status: &str) -> ArchiveRow {
    ArchiveRow::default()
        .with("id", id)
        .with("created_at", created_at)
        .with("status", status)
        .with("payload", format!("event-{id}"))
}

pub fn old_rows(ids: std::ops::Range<i64>) -> Vec<ArchiveRow> {
    ids.map(|id| old_row(id, "closed")).collect()
}

pub fn config(batch_size: u64, job_quota: u64) -> ArchiveConfig {
    ArchiveConfig { batch_size, job_quota, ..ArchiveConfig::default() }
}
