//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use dbarchive_domain::{ComparisonOp, DateFormat, DbArchiveError, Predicate, SchedulingMode};
use dbarchive_infra::config;
use tempfile::TempDir;

#[test]
fn test_load_full_toml_configuration() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("dbarchive.toml");
    std::fs::write(
        &path,
        r#"
enable_logging = false
tables = [
    "events",
    { name = "audit_log", batch_size = 50, job_size = 200, conditions = [["level", "!=", "critical"], ["archived", true]] },
    { name = "pings", date_column = "seen_at", date_format = "unix", primary_id = "ping_id" },
]

[database]
source_path = "live.db"
archive_path = "cold.db"
pool_size = 2

[settings]
batch_size = 1000
job_size = "lots"
archive_older_than_days = 90
conditions = { status = "closed" }

[queueing]
enable_queuing = true
sequential = false
workers = 3
"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("config should load");

    assert!(!config.enable_logging);
    assert_eq!(config.database.source_path, dir.path().join("live.db"));
    assert_eq!(config.database.archive_path, Some(dir.path().join("cold.db")));
    assert_eq!(config.database.pool_size, 2);
    assert_eq!(config.queueing.mode(), SchedulingMode::Parallel);
    assert_eq!(config.queueing.workers, 3);

    let events = config.config_for("events");
    assert_eq!(events.batch_size, 1000);
    assert_eq!(events.job_quota, 100_000, "invalid job_size falls back to the default");
    assert_eq!(events.cutoff_days, 90);
    assert_eq!(events.conditions, vec![Predicate::equals("status", "closed")]);

    let audit = config.config_for("audit_log");
    assert_eq!(audit.batch_size, 50);
    assert_eq!(audit.job_quota, 200);
    assert_eq!(
        audit.conditions,
        vec![
            Predicate::compare("level", ComparisonOp::NotEq, "critical"),
            Predicate::equals("archived", 1_i64),
        ]
    );

    let pings = config.config_for("pings");
    assert_eq!(pings.date_column, "seen_at");
    assert_eq!(pings.date_format, DateFormat::Unix);
    assert_eq!(pings.primary_key_column, "ping_id");

    let sequence = config.table_sequence();
    let order: Vec<&str> = sequence.iter().collect();
    assert_eq!(order, vec!["events", "audit_log", "pings"]);
}

#[test]
fn test_load_validates_same_store_prefix() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("dbarchive.json");
    std::fs::write(&path, r#"{ "database": { "source_path": "app.db" }, "tables": ["events"] }"#)
        .expect("Failed to write config");

    let err = config::load(Some(path)).unwrap_err();

    assert!(matches!(err, DbArchiveError::Configuration(_)));
}

#[test]
fn test_load_rejects_malformed_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("dbarchive.toml");
    std::fs::write(&path, "[database\nsource_path = ").expect("Failed to write config");

    let err = config::load_from_file(Some(path)).unwrap_err();

    assert!(matches!(err, DbArchiveError::Configuration(message) if message.contains("TOML")));
}
