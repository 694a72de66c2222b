//! One-time preparation of the archive store: create it if needed and clone
//! each configured table's schema into it.

use dbarchive_domain::{ArchiveConfig, DatabaseConfig, DbArchiveError, Result};
use once_cell::sync::OnceCell;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::manager::{create_database_file, DbManager, SOURCE_SCHEMA};
use super::sql::{qualified, retarget_create_index, retarget_create_table};
use crate::errors::map_sql_error;

/// What `prepare_tables` did for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSetup {
    Created,
    Recreated,
    /// The archive table already existed and `force` was off.
    Skipped,
}

/// Per-table result of a setup pass, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub archive_created: bool,
    pub tables: Vec<(String, TableSetup)>,
}

/// Schema cloning and archive store creation.
///
/// The connection pool is opened on first use, so the archive store can be
/// checked and created before anything attaches it.
#[derive(Debug)]
pub struct SetupService {
    config: DatabaseConfig,
    db: OnceCell<DbManager>,
}

impl SetupService {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config, db: OnceCell::new() }
    }

    fn db(&self) -> Result<&DbManager> {
        self.db.get_or_try_init(|| DbManager::new(&self.config))
    }

    /// True when archive tables live in the source database or the archive
    /// file exists.
    pub fn archive_store_exists(&self) -> bool {
        self.config.archive_path.as_ref().map_or(true, |path| path.exists())
    }

    /// Create the archive database file. A no-op in same-store mode or when
    /// the file already exists.
    ///
    /// # Errors
    /// Returns `DbArchiveError::Configuration` when the file or its parent
    /// directory cannot be created.
    pub fn create_archive_store(&self) -> Result<bool> {
        match &self.config.archive_path {
            Some(path) if !path.exists() => {
                create_database_file(path)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn archive_table_exists(&self, archive_table: &str) -> Result<bool> {
        let db = self.db()?;
        let conn = db.get_connection()?;
        table_exists(&conn, db.archive_schema(), archive_table)
    }

    /// Create `archive_table` with the same definition and explicit indexes
    /// as the source `table`.
    ///
    /// # Errors
    /// `DbArchiveError::NotFound` when the source table does not exist;
    /// mapped SQLite errors when the archive table already exists or a
    /// statement fails. Nothing is created unless every statement succeeds.
    #[instrument(skip(self))]
    pub fn clone_schema(&self, table: &str, archive_table: &str) -> Result<()> {
        let db = self.db()?;
        let schema = db.archive_schema();
        if schema == SOURCE_SCHEMA && table == archive_table {
            return Err(DbArchiveError::Configuration(format!(
                "cannot archive '{table}' into itself; set a table_prefix"
            )));
        }

        let mut conn = db.get_connection()?;
        let create_sql: String = conn
            .query_row(
                "SELECT sql FROM main.sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sql_error)?
            .ok_or_else(|| DbArchiveError::NotFound(format!("source table '{table}' does not exist")))?;

        let create_table = retarget_create_table(&create_sql, schema, archive_table).ok_or_else(|| {
            DbArchiveError::Internal(format!("unrecognised table definition for '{table}'"))
        })?;

        let indexes = source_indexes(&conn, table)?;

        let tx = conn.transaction().map_err(map_sql_error)?;
        tx.execute_batch(&create_table).map_err(map_sql_error)?;
        for (name, sql) in &indexes {
            match retarget_create_index(sql, name, schema, archive_table) {
                Some(statement) => tx.execute_batch(&statement).map_err(map_sql_error)?,
                None => warn!(index = %name, "skipping index with unrecognised definition"),
            }
        }
        tx.commit().map_err(map_sql_error)?;

        info!(table, archive_table, schema, indexes = indexes.len(), "cloned table schema");
        Ok(())
    }

    pub fn drop_archive_table(&self, archive_table: &str) -> Result<()> {
        let db = self.db()?;
        let conn = db.get_connection()?;
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}",
            qualified(db.archive_schema(), archive_table)
        ))
        .map_err(map_sql_error)?;
        info!(archive_table, "dropped archive table");
        Ok(())
    }

    /// Full setup pass over the configured tables.
    ///
    /// Creates the archive store when missing, then clones every table whose
    /// archive counterpart does not exist yet. With `force`, existing archive
    /// tables are dropped and recreated.
    ///
    /// # Errors
    /// `DbArchiveError::Configuration` when no tables are configured or, in
    /// same-store mode, a table resolves without a prefix. The first failing
    /// clone aborts the pass.
    pub fn prepare_tables(&self, tables: &[(String, ArchiveConfig)], force: bool) -> Result<SetupReport> {
        if tables.is_empty() {
            return Err(DbArchiveError::Configuration("no tables configured".into()));
        }

        if self.config.is_same_store() {
            if let Some((table, _)) = tables.iter().find(|(_, config)| config.table_prefix.is_none()) {
                return Err(DbArchiveError::Configuration(format!(
                    "archive tables share the source database; table '{table}' needs a table_prefix"
                )));
            }
        }

        let mut report = SetupReport { archive_created: self.create_archive_store()?, ..SetupReport::default() };

        for (table, config) in tables {
            let archive_table = config.archive_table_name(table);
            let outcome = if self.archive_table_exists(&archive_table)? {
                if !force {
                    warn!(table = %table, archive_table = %archive_table, "archive table already exists; use --force to recreate");
                    report.tables.push((table.clone(), TableSetup::Skipped));
                    continue;
                }
                self.drop_archive_table(&archive_table)?;
                TableSetup::Recreated
            } else {
                TableSetup::Created
            };

            self.clone_schema(table, &archive_table)?;
            report.tables.push((table.clone(), outcome));
        }

        Ok(report)
    }
}

fn table_exists(conn: &rusqlite::Connection, schema: &str, table: &str) -> Result<bool> {
    conn.query_row(
        &format!("SELECT 1 FROM {schema}.sqlite_master WHERE type = 'table' AND name = ?1"),
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(map_sql_error)
}

/// Explicit (non-automatic) indexes on a source table.
fn source_indexes(conn: &rusqlite::Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM main.sqlite_master \
             WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL ORDER BY name",
        )
        .map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}
