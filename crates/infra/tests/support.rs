#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dbarchive_core::{ChunkedArchiver, TracingLog};
use dbarchive_domain::{ArchiveConfig, DatabaseConfig};
use dbarchive_infra::database::{create_database_file, DbManager, SetupService, SqliteArchiveStore};
use rusqlite::{params, Connection};
use tempfile::TempDir;

pub const EVENTS_SCHEMA: &str = "
    CREATE TABLE events (
        id INTEGER PRIMARY KEY,
        created_at TEXT NOT NULL,
        status TEXT NOT NULL,
        amount REAL,
        payload BLOB,
        note TEXT
    );
    CREATE INDEX idx_events_created_at ON events (created_at);
";

pub const NOTES_SCHEMA: &str = "
    CREATE TABLE notes (
        id INTEGER PRIMARY KEY,
        created_at TEXT NOT NULL,
        body TEXT NOT NULL
    );
";

/// Fixed "now" for archivers: 2025-01-01 00:00:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Source and archive database files living in one temporary directory.
pub struct TestDatabases {
    pub config: DatabaseConfig,
    _temp_dir: TempDir,
}

impl TestDatabases {
    /// `source.db` with the test schemas and an existing, empty `archive.db`.
    pub fn separate() -> Self {
        let databases = Self::separate_without_archive_file();
        create_database_file(databases.config.archive_path.as_ref().unwrap()).unwrap();
        databases
    }

    /// Like [`separate`](Self::separate) but `archive.db` does not exist yet.
    pub fn separate_without_archive_file() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let source = temp_dir.path().join("source.db");
        create_source(&source);
        let config = DatabaseConfig::new(&source).with_archive(temp_dir.path().join("archive.db"));
        Self { config, _temp_dir: temp_dir }
    }

    /// Archive tables share `source.db`.
    pub fn same_store() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let source = temp_dir.path().join("source.db");
        create_source(&source);
        Self { config: DatabaseConfig::new(&source), _temp_dir: temp_dir }
    }

    pub fn source(&self) -> Connection {
        Connection::open(&self.config.source_path).unwrap()
    }

    pub fn archive(&self) -> Connection {
        match &self.config.archive_path {
            Some(path) => Connection::open(path).unwrap(),
            None => self.source(),
        }
    }

    pub fn manager(&self) -> Arc<DbManager> {
        Arc::new(DbManager::new(&self.config).expect("db manager should be created"))
    }

    pub fn store(&self) -> Arc<SqliteArchiveStore> {
        Arc::new(SqliteArchiveStore::new(self.manager()))
    }

    pub fn setup(&self) -> SetupService {
        SetupService::new(self.config.clone())
    }

    pub fn archiver(&self) -> ChunkedArchiver {
        ChunkedArchiver::new(self.store(), Arc::new(TracingLog::default())).with_clock(fixed_now)
    }

    /// Clone the archive tables for `tables` using their resolved settings.
    pub fn prepare(&self, tables: &[(&str, ArchiveConfig)]) {
        let tables: Vec<(String, ArchiveConfig)> =
            tables.iter().map(|(table, config)| ((*table).to_string(), config.clone())).collect();
        self.setup().prepare_tables(&tables, false).expect("setup should succeed");
    }

    /// Insert events `ids` dated `2020-01-01 00:MM:SS`.
    pub fn seed_old_events(&self, ids: std::ops::Range<i64>, status: &str) {
        let conn = self.source();
        for id in ids {
            let created_at = format!("2020-01-01 00:{:02}:{:02}", (id / 60) % 60, id % 60);
            insert_event(&conn, id, &created_at, status);
        }
    }

    pub fn seed_event_at(&self, id: i64, created_at: &str, status: &str) {
        insert_event(&self.source(), id, created_at, status);
    }

    pub fn source_ids(&self, table: &str) -> Vec<i64> {
        ids(&self.source(), "main", table)
    }

    pub fn archive_ids(&self, archive_table: &str) -> Vec<i64> {
        ids(&self.archive(), "main", archive_table)
    }
}

fn create_source(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(EVENTS_SCHEMA).unwrap();
    conn.execute_batch(NOTES_SCHEMA).unwrap();
}

fn insert_event(conn: &Connection, id: i64, created_at: &str, status: &str) {
    conn.execute(
        "INSERT INTO events (id, created_at, status, amount, payload, note) VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
        params![id, created_at, status, id as f64 * 1.5, vec![0_u8, 1, id as u8]],
    )
    .unwrap();
}

pub fn ids(conn: &Connection, schema: &str, table: &str) -> Vec<i64> {
    let mut stmt = conn.prepare(&format!("SELECT id FROM \"{schema}\".\"{table}\" ORDER BY id")).unwrap();
    stmt.query_map([], |row| row.get(0)).unwrap().collect::<Result<Vec<i64>, _>>().unwrap()
}

pub fn config(batch_size: u64, job_quota: u64) -> ArchiveConfig {
    ArchiveConfig { batch_size, job_quota, ..ArchiveConfig::default() }
}
