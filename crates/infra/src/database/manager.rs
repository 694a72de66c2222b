//! Database connection manager over the source database with the archive
//! database attached.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dbarchive_domain::{DatabaseConfig, DbArchiveError, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{info, instrument};

use crate::errors::{map_pool_error, map_sql_error};

/// Schema name the archive database is attached under.
pub const ARCHIVE_SCHEMA: &str = "archive";
/// Schema name of the source database on every connection.
pub const SOURCE_SCHEMA: &str = "main";

/// A pooled connection to the source database.
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Owns an r2d2 pool over the source database.
///
/// When a separate archive file is configured every pooled connection
/// attaches it as [`ARCHIVE_SCHEMA`]; otherwise archive tables live in
/// [`SOURCE_SCHEMA`]. Connections keep the rollback journal so a single
/// transaction commits atomically across both files.
#[derive(Debug)]
pub struct DbManager {
    pool: Pool<SqliteConnectionManager>,
    source_path: PathBuf,
    archive_path: Option<PathBuf>,
}

impl DbManager {
    /// Open the pool described by `config`.
    ///
    /// # Errors
    /// Returns `DbArchiveError::Configuration` when the source database does
    /// not exist, or when the archive database does not exist and
    /// `create_archive_if_missing` is off. Pool construction failures map to
    /// `DbArchiveError::Database`.
    #[instrument(skip(config), fields(source = %config.source_path.display()))]
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        if !config.source_path.exists() {
            return Err(DbArchiveError::Configuration(format!(
                "source database not found: {}",
                config.source_path.display()
            )));
        }

        if let Some(archive) = &config.archive_path {
            if !archive.exists() {
                if !config.create_archive_if_missing {
                    return Err(DbArchiveError::Configuration(format!(
                        "archive database not found: {} (run `dbarchive setup` or set \
                         create_archive_if_missing)",
                        archive.display()
                    )));
                }
                create_database_file(archive)?;
            }
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let attach = config.archive_path.clone();
        let manager = SqliteConnectionManager::file(&config.source_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=FULL;")?;
            if let Some(path) = &attach {
                conn.execute(
                    &format!("ATTACH DATABASE ?1 AS {ARCHIVE_SCHEMA}"),
                    params![path.to_string_lossy()],
                )?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_timeout(busy_timeout.max(Duration::from_secs(1)))
            .build(manager)
            .map_err(map_pool_error)?;

        info!(
            source = %config.source_path.display(),
            archive = ?config.archive_path,
            max_connections = config.pool_size.max(1),
            "sqlite pool initialised"
        );

        Ok(Self {
            pool,
            source_path: config.source_path.clone(),
            archive_path: config.archive_path.clone(),
        })
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<DbConnection> {
        self.pool.get().map_err(map_pool_error)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }

    /// Schema archive tables are created in and written to.
    pub fn archive_schema(&self) -> &'static str {
        if self.archive_path.is_some() {
            ARCHIVE_SCHEMA
        } else {
            SOURCE_SCHEMA
        }
    }

    /// Verify both databases are reachable through a pooled connection.
    ///
    /// # Errors
    /// Returns `DbArchiveError::Configuration` when the archive file has
    /// disappeared, or the mapped SQLite error when a health query fails.
    pub fn health_check(&self) -> Result<()> {
        if let Some(archive) = &self.archive_path {
            if !archive.exists() {
                return Err(DbArchiveError::Configuration(format!(
                    "archive database not found: {}",
                    archive.display()
                )));
            }
        }

        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}.sqlite_master", self.archive_schema()),
            params![],
            |row| row.get::<_, i64>(0),
        )
        .map_err(map_sql_error)?;
        Ok(())
    }
}

/// Create an empty SQLite database file, including missing parent
/// directories.
pub fn create_database_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DbArchiveError::Configuration(format!(
                "cannot create directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let conn = rusqlite::Connection::open(path).map_err(map_sql_error)?;
    conn.execute_batch("PRAGMA journal_mode=DELETE;\nVACUUM;").map_err(map_sql_error)?;
    info!(path = %path.display(), "created archive database");
    Ok(())
}
