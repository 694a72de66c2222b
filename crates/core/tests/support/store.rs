//! In-memory `ArchiveStore` with failure injection.
//!
//! Writes made inside a batch are staged and only applied on commit, so a
//! failed batch leaves both tables exactly as they were.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use dbarchive_core::{ArchiveStore, BatchTransaction, EligibilityFilter};
use dbarchive_domain::{ArchiveRow, DbArchiveError, Result, SqlValue};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Tables {
    source: BTreeMap<String, Vec<ArchiveRow>>,
    archive: BTreeMap<String, Vec<ArchiveRow>>,
}

#[derive(Debug, Default)]
struct Faults {
    unhealthy: bool,
    fail_count: bool,
    fail_insert_at_batch: Option<usize>,
    fail_insert_for_tables: HashSet<String>,
    short_delete: bool,
    drain_after_count: bool,
}

/// Rows per table plus a record of every batch that touched them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    batches_begun: Mutex<usize>,
    selected_per_batch: Mutex<Vec<usize>>,
    commits: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<ArchiveRow>) {
        self.tables.lock().source.entry(table.to_string()).or_default().extend(rows);
    }

    /// Put a row straight into an archive table, e.g. to provoke a key clash.
    pub fn seed_archive(&self, archive_table: &str, rows: Vec<ArchiveRow>) {
        self.tables.lock().archive.entry(archive_table.to_string()).or_default().extend(rows);
    }

    pub fn source_rows(&self, table: &str) -> Vec<ArchiveRow> {
        self.tables.lock().source.get(table).cloned().unwrap_or_default()
    }

    pub fn archive_rows(&self, archive_table: &str) -> Vec<ArchiveRow> {
        self.tables.lock().archive.get(archive_table).cloned().unwrap_or_default()
    }

    pub fn source_ids(&self, table: &str) -> Vec<i64> {
        ids(&self.source_rows(table))
    }

    pub fn archive_ids(&self, archive_table: &str) -> Vec<i64> {
        ids(&self.archive_rows(archive_table))
    }

    /// Rows selected by each batch, in order.
    pub fn selected_per_batch(&self) -> Vec<usize> {
        self.selected_per_batch.lock().clone()
    }

    pub fn commits(&self) -> usize {
        *self.commits.lock()
    }

    pub fn set_unhealthy(&self) {
        self.faults.lock().unhealthy = true;
    }

    pub fn fail_count(&self) {
        self.faults.lock().fail_count = true;
    }

    /// The archive insert of the `n`th batch begun (1-based) fails.
    pub fn fail_insert_at_batch(&self, n: usize) {
        self.faults.lock().fail_insert_at_batch = Some(n);
    }

    /// Every archive insert for rows of `table` fails.
    pub fn fail_inserts_for(&self, table: &str) {
        self.faults.lock().fail_insert_for_tables.insert(table.to_string());
    }

    /// Deletes report one row fewer than requested.
    pub fn short_delete(&self) {
        self.faults.lock().short_delete = true;
    }

    /// Simulates another writer removing every eligible row right after the
    /// eligible count was taken.
    pub fn drain_after_count(&self) {
        self.faults.lock().drain_after_count = true;
    }
}

fn ids(rows: &[ArchiveRow]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| match row.get("id") {
            Some(SqlValue::Integer(id)) => Some(*id),
            _ => None,
        })
        .collect()
}

fn order(filter: &EligibilityFilter, a: &ArchiveRow, b: &ArchiveRow) -> Ordering {
    filter
        .order_columns()
        .iter()
        .map(|column| match (a.get(column), b.get(column)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl ArchiveStore for MemoryStore {
    fn count_eligible(&self, filter: &EligibilityFilter) -> Result<u64> {
        if self.faults.lock().fail_count {
            return Err(DbArchiveError::Database("count query failed".into()));
        }

        let mut tables = self.tables.lock();
        let rows = tables.source.entry(filter.table.clone()).or_default();
        let count = rows.iter().filter(|row| filter.matches(row)).count() as u64;

        if self.faults.lock().drain_after_count {
            rows.retain(|row| !filter.matches(row));
        }
        Ok(count)
    }

    fn begin_batch(&self) -> Result<Box<dyn BatchTransaction + '_>> {
        let mut begun = self.batches_begun.lock();
        *begun += 1;
        Ok(Box::new(MemoryBatch {
            store: self,
            number: *begun,
            inserts: Vec::new(),
            deletes: Vec::new(),
        }))
    }

    fn health_check(&self) -> Result<()> {
        if self.faults.lock().unhealthy {
            return Err(DbArchiveError::Database("archive store unreachable".into()));
        }
        Ok(())
    }
}

struct MemoryBatch<'a> {
    store: &'a MemoryStore,
    number: usize,
    inserts: Vec<(String, ArchiveRow)>,
    deletes: Vec<(String, String, SqlValue)>,
}

impl BatchTransaction for MemoryBatch<'_> {
    fn select_eligible(&mut self, filter: &EligibilityFilter, limit: u64) -> Result<Vec<ArchiveRow>> {
        let tables = self.store.tables.lock();
        let mut rows: Vec<ArchiveRow> = tables
            .source
            .get(&filter.table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| order(filter, a, b));
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        self.store.selected_per_batch.lock().push(rows.len());
        Ok(rows)
    }

    fn insert_into_archive(&mut self, archive_table: &str, rows: &[ArchiveRow]) -> Result<usize> {
        {
            let faults = self.store.faults.lock();
            if faults.fail_insert_at_batch == Some(self.number) {
                return Err(DbArchiveError::Database(format!(
                    "UNIQUE constraint failed: {archive_table}.id"
                )));
            }
            if faults.fail_insert_for_tables.iter().any(|table| archive_table.ends_with(table.as_str())) {
                return Err(DbArchiveError::Database(format!("insert into {archive_table} failed")));
            }
        }

        let tables = self.store.tables.lock();
        let existing: HashSet<i64> =
            tables.archive.get(archive_table).map(|rows| ids(rows)).unwrap_or_default().into_iter().collect();
        for id in ids(rows) {
            if existing.contains(&id) {
                return Err(DbArchiveError::Database(format!(
                    "UNIQUE constraint failed: {archive_table}.id ({id})"
                )));
            }
        }
        drop(tables);

        self.inserts.extend(rows.iter().map(|row| (archive_table.to_string(), row.clone())));
        Ok(rows.len())
    }

    fn delete_from_source(&mut self, table: &str, key_column: &str, keys: &[SqlValue]) -> Result<usize> {
        let tables = self.store.tables.lock();
        let matched = tables
            .source
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        row.get(key_column).is_some_and(|value| keys.contains(value))
                    })
                    .count()
            })
            .unwrap_or_default();
        drop(tables);

        self.deletes.extend(
            keys.iter().map(|key| (table.to_string(), key_column.to_string(), key.clone())),
        );

        if self.store.faults.lock().short_delete {
            return Ok(matched.saturating_sub(1));
        }
        Ok(matched)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let Self { store, inserts, deletes, .. } = *self;
        let mut tables = store.tables.lock();
        for (table, key_column, key) in &deletes {
            if let Some(rows) = tables.source.get_mut(table) {
                rows.retain(|row| row.get(key_column) != Some(key));
            }
        }
        for (archive_table, row) in inserts {
            tables.archive.entry(archive_table).or_default().push(row);
        }
        drop(tables);
        *store.commits.lock() += 1;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
