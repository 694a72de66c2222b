//! Defaults applied when neither the global settings nor a table override
//! provide a usable value.

pub const DEFAULT_BATCH_SIZE: u64 = 1000;
pub const DEFAULT_JOB_QUOTA: u64 = 100_000;
pub const DEFAULT_CUTOFF_DAYS: u32 = 365;
pub const DEFAULT_DATE_COLUMN: &str = "created_at";
pub const DEFAULT_PRIMARY_KEY_COLUMN: &str = "id";

pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_QUEUE_WORKERS: usize = 4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Text layout used for `date_format = "datetime"` cutoffs.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
