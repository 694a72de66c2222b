//! Port interfaces for moving rows between the source and archive stores

use dbarchive_domain::{ArchiveRow, Result, SqlValue};

use super::filter::EligibilityFilter;

/// Access to the source and archive tables.
///
/// Implementations are blocking; async callers run the engine on a blocking
/// thread.
pub trait ArchiveStore: Send + Sync {
    /// Number of rows currently matching `filter`.
    fn count_eligible(&self, filter: &EligibilityFilter) -> Result<u64>;

    /// Open a transaction scoped to exactly one batch.
    fn begin_batch(&self) -> Result<Box<dyn BatchTransaction + '_>>;

    /// Verify both stores are reachable.
    fn health_check(&self) -> Result<()>;
}

/// One open batch transaction.
///
/// Nothing is visible to other connections until [`commit`]. Dropping an
/// uncommitted transaction rolls it back.
///
/// [`commit`]: BatchTransaction::commit
pub trait BatchTransaction {
    /// Up to `limit` matching rows ordered by `filter.order_columns()`.
    fn select_eligible(&mut self, filter: &EligibilityFilter, limit: u64) -> Result<Vec<ArchiveRow>>;

    /// Insert full row payloads into `archive_table`; returns rows written.
    fn insert_into_archive(&mut self, archive_table: &str, rows: &[ArchiveRow]) -> Result<usize>;

    /// Delete rows from the source `table` whose `key_column` is in `keys`;
    /// returns rows deleted.
    fn delete_from_source(&mut self, table: &str, key_column: &str, keys: &[SqlValue])
        -> Result<usize>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}
