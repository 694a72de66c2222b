//! SQLite implementation of the archive store ports.

use std::sync::Arc;

use dbarchive_core::{ArchiveStore, BatchTransaction, EligibilityFilter};
use dbarchive_domain::{ArchiveRow, DbArchiveError, Result, SqlValue};
use rusqlite::params_from_iter;
use tracing::{debug, warn};

use super::manager::{DbConnection, DbManager, SOURCE_SCHEMA};
use super::sql::{
    count_query, delete_statement, from_value_ref, insert_statement, select_query, Bound,
    MAX_IN_LIST_PARAMS,
};
use crate::errors::map_sql_error;

/// Archive store over a [`DbManager`] pool.
#[derive(Debug, Clone)]
pub struct SqliteArchiveStore {
    db: Arc<DbManager>,
}

impl SqliteArchiveStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub fn manager(&self) -> &Arc<DbManager> {
        &self.db
    }
}

impl ArchiveStore for SqliteArchiveStore {
    fn count_eligible(&self, filter: &EligibilityFilter) -> Result<u64> {
        let conn = self.db.get_connection()?;
        let query = count_query(SOURCE_SCHEMA, filter);
        let count: i64 = conn
            .query_row(&query.sql, params_from_iter(query.bound()), |row| row.get(0))
            .map_err(map_sql_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn begin_batch(&self) -> Result<Box<dyn BatchTransaction + '_>> {
        let conn = self.db.get_connection()?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(map_sql_error)?;
        Ok(Box::new(SqliteBatch { conn, archive_schema: self.db.archive_schema(), open: true }))
    }

    fn health_check(&self) -> Result<()> {
        self.db.health_check()
    }
}

/// One `BEGIN IMMEDIATE ... COMMIT` on a single pooled connection.
struct SqliteBatch {
    conn: DbConnection,
    archive_schema: &'static str,
    open: bool,
}

impl SqliteBatch {
    fn finish(&mut self, statement: &str) -> Result<()> {
        self.conn.execute_batch(statement).map_err(map_sql_error)?;
        self.open = false;
        Ok(())
    }
}

impl BatchTransaction for SqliteBatch {
    fn select_eligible(&mut self, filter: &EligibilityFilter, limit: u64) -> Result<Vec<ArchiveRow>> {
        let query = select_query(SOURCE_SCHEMA, filter, limit);
        let mut stmt = self.conn.prepare(&query.sql).map_err(map_sql_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let mut rows = stmt.query(params_from_iter(query.bound())).map_err(map_sql_error)?;
        let mut selected = Vec::new();
        while let Some(row) = rows.next().map_err(map_sql_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(map_sql_error)?;
                values.push((column.clone(), from_value_ref(value)));
            }
            selected.push(ArchiveRow::new(values));
        }

        debug!(table = %filter.table, rows = selected.len(), "selected batch");
        Ok(selected)
    }

    fn insert_into_archive(&mut self, archive_table: &str, rows: &[ArchiveRow]) -> Result<usize> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        let sql = insert_statement(self.archive_schema, archive_table, first.column_names());
        let mut stmt = self.conn.prepare_cached(&sql).map_err(map_sql_error)?;

        let mut inserted = 0;
        for row in rows {
            if row.len() != first.len() {
                return Err(DbArchiveError::Internal(format!(
                    "row shape changed within a batch for {archive_table}"
                )));
            }
            inserted += stmt
                .execute(params_from_iter(row.values().map(Bound)))
                .map_err(map_sql_error)?;
        }
        Ok(inserted)
    }

    fn delete_from_source(&mut self, table: &str, key_column: &str, keys: &[SqlValue]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in keys.chunks(MAX_IN_LIST_PARAMS) {
            let sql = delete_statement(SOURCE_SCHEMA, table, key_column, chunk.len());
            deleted += self
                .conn
                .execute(&sql, params_from_iter(chunk.iter().map(Bound)))
                .map_err(map_sql_error)?;
        }
        Ok(deleted)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteBatch {
    fn drop(&mut self) {
        if self.open {
            if let Err(error) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %error, "rollback of abandoned batch failed");
            }
        }
    }
}
