//! Archive settings and application configuration
//!
//! Settings arrive as loosely-typed overrides (global `[settings]` plus
//! optional per-table entries) and are resolved into an immutable
//! [`ArchiveConfig`]. Resolution never fails: values that are missing, of the
//! wrong type, zero where a positive number is required, or empty where an
//! identifier is required fall through to the next layer and finally to the
//! built-in defaults.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::constants::{
    DATETIME_FORMAT, DEFAULT_BATCH_SIZE, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CUTOFF_DAYS,
    DEFAULT_DATE_COLUMN, DEFAULT_JOB_QUOTA, DEFAULT_MAX_ATTEMPTS, DEFAULT_POOL_SIZE,
    DEFAULT_PRIMARY_KEY_COLUMN, DEFAULT_QUEUE_WORKERS,
};
use crate::errors::{DbArchiveError, Result};
use crate::impl_status_conversions;
use crate::types::{normalise_conditions, Predicate, RawCondition, SqlValue, TableSequence};

/// How the date column is stored, which decides how the cutoff is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// Text in `YYYY-MM-DD HH:MM:SS` form (UTC).
    #[default]
    Datetime,
    /// Integer seconds since the Unix epoch.
    Unix,
    /// Integer milliseconds since the Unix epoch.
    UnixMs,
}

impl_status_conversions!(DateFormat {
    Datetime => "datetime",
    Unix => "unix",
    UnixMs => "unix_ms",
});

impl DateFormat {
    /// Encode an instant so it compares correctly against the stored column.
    pub fn encode(self, at: DateTime<Utc>) -> SqlValue {
        match self {
            Self::Datetime => SqlValue::Text(at.format(DATETIME_FORMAT).to_string()),
            Self::Unix => SqlValue::Integer(at.timestamp()),
            Self::UnixMs => SqlValue::Integer(at.timestamp_millis()),
        }
    }
}

/// Raw, possibly partial archive settings exactly as configured.
///
/// Field names follow the configuration keys. Every field is optional and
/// deserialized leniently: a value of the wrong type is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveOverrides {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub table_prefix: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub job_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub archive_older_than_days: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_conditions",
        skip_serializing_if = "Option::is_none"
    )]
    pub conditions: Option<Vec<RawCondition>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub primary_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => {
            warn!(value = %value, error = %err, "setting ignored: unexpected value");
            Ok(None)
        }
    }
}

/// Conditions accept a list of entries or, for compatibility, a single
/// `{ column = value }` table. Anything else is kept as one unusable entry.
fn lenient_conditions<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<RawCondition>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let entries = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Array(entries) => entries,
        other => vec![other],
    };

    let conditions = entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value::<RawCondition>(entry.clone())
                .unwrap_or(RawCondition::Other(entry))
        })
        .collect();
    Ok(Some(conditions))
}

fn positive(candidates: [Option<u64>; 2], fallback: u64) -> u64 {
    candidates.into_iter().flatten().find(|value| *value > 0).unwrap_or(fallback)
}

fn identifier(candidates: [Option<&String>; 2], fallback: &str) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Fully resolved settings for archiving one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub table_prefix: Option<String>,
    pub batch_size: u64,
    pub job_quota: u64,
    pub cutoff_days: u32,
    pub date_column: String,
    pub conditions: Vec<Predicate>,
    pub primary_key_column: String,
    pub date_format: DateFormat,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            table_prefix: None,
            batch_size: DEFAULT_BATCH_SIZE,
            job_quota: DEFAULT_JOB_QUOTA,
            cutoff_days: DEFAULT_CUTOFF_DAYS,
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            conditions: Vec::new(),
            primary_key_column: DEFAULT_PRIMARY_KEY_COLUMN.to_string(),
            date_format: DateFormat::default(),
        }
    }
}

impl ArchiveConfig {
    /// Merge per-table `overrides` over the global `defaults`.
    ///
    /// The first usable value wins: override, then global default, then the
    /// built-in constant. `conditions` from the override replace the global
    /// list as a whole rather than being appended to it.
    pub fn build(defaults: &ArchiveOverrides, overrides: &ArchiveOverrides) -> Self {
        let table_prefix = [overrides.table_prefix.as_ref(), defaults.table_prefix.as_ref()]
            .into_iter()
            .flatten()
            .map(|prefix| prefix.trim())
            .find(|prefix| !prefix.is_empty())
            .map(str::to_string);

        let conditions = overrides
            .conditions
            .clone()
            .or_else(|| defaults.conditions.clone())
            .map(normalise_conditions)
            .unwrap_or_default();

        Self {
            table_prefix,
            batch_size: positive([overrides.batch_size, defaults.batch_size], DEFAULT_BATCH_SIZE),
            job_quota: positive([overrides.job_size, defaults.job_size], DEFAULT_JOB_QUOTA),
            cutoff_days: overrides
                .archive_older_than_days
                .or(defaults.archive_older_than_days)
                .unwrap_or(DEFAULT_CUTOFF_DAYS),
            date_column: identifier(
                [overrides.date_column.as_ref(), defaults.date_column.as_ref()],
                DEFAULT_DATE_COLUMN,
            ),
            conditions,
            primary_key_column: identifier(
                [overrides.primary_id.as_ref(), defaults.primary_id.as_ref()],
                DEFAULT_PRIMARY_KEY_COLUMN,
            ),
            date_format: overrides.date_format.or(defaults.date_format).unwrap_or_default(),
        }
    }

    /// Name of the table rows are moved into.
    pub fn archive_table_name(&self, table: &str) -> String {
        match self.table_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_{table}"),
            _ => table.to_string(),
        }
    }

    /// Fails when any configured condition could not be parsed. Such a table
    /// is never archived.
    ///
    /// # Errors
    /// Returns `DbArchiveError::Configuration` naming the first unusable
    /// condition.
    pub fn check_conditions(&self) -> Result<()> {
        match self.conditions.iter().find(|predicate| !predicate.is_usable()) {
            Some(predicate) => {
                Err(DbArchiveError::Configuration(format!("unusable condition {predicate}")))
            }
            None => Ok(()),
        }
    }

    /// Rows dated strictly before this instant are eligible. A cutoff past
    /// the earliest representable instant clamps to it, which matches
    /// nothing.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(i64::from(self.cutoff_days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// The cutoff encoded for comparison against `date_column`.
    pub fn cutoff_value(&self, now: DateTime<Utc>) -> SqlValue {
        self.date_format.encode(self.cutoff(now))
    }
}

/// Scheduling strategy derived from the `[queueing]` switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    Synchronous,
    Sequential,
    Parallel,
    Grouped,
}

impl_status_conversions!(SchedulingMode {
    Synchronous => "synchronous",
    Sequential => "sequential",
    Parallel => "parallel",
    Grouped => "grouped",
});

/// `[queueing]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueingConfig {
    pub enable_queuing: bool,
    pub enable_batching: bool,
    #[serde(alias = "process_tables_async")]
    pub sequential: bool,
    pub workers: usize,
    pub max_attempts: u32,
}

impl Default for QueueingConfig {
    fn default() -> Self {
        Self {
            enable_queuing: true,
            enable_batching: false,
            sequential: true,
            workers: DEFAULT_QUEUE_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl QueueingConfig {
    /// Batching takes precedence over sequential chaining when both are set.
    pub fn mode(&self) -> SchedulingMode {
        if !self.enable_queuing {
            SchedulingMode::Synchronous
        } else if self.enable_batching {
            SchedulingMode::Grouped
        } else if self.sequential {
            SchedulingMode::Sequential
        } else {
            SchedulingMode::Parallel
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub source_path: PathBuf,
    /// Absent means archive tables live next to the source tables.
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub create_archive_if_missing: bool,
}

const fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl DatabaseConfig {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            archive_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            create_archive_if_missing: false,
        }
    }

    #[must_use]
    pub fn with_archive(mut self, archive_path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(archive_path.into());
        self
    }

    /// True when archive tables share the source database file.
    pub fn is_same_store(&self) -> bool {
        self.archive_path.is_none()
    }
}

/// One entry of the `tables` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(flatten)]
        overrides: ArchiveOverrides,
    },
}

impl TableEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }

    pub fn overrides(&self) -> Option<&ArchiveOverrides> {
        match self {
            Self::Name(_) => None,
            Self::Detailed { overrides, .. } => Some(overrides),
        }
    }
}

const fn default_enable_logging() -> bool {
    true
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub settings: ArchiveOverrides,
    #[serde(default)]
    pub tables: Vec<TableEntry>,
    #[serde(default)]
    pub queueing: QueueingConfig,
    #[serde(default = "default_enable_logging")]
    pub enable_logging: bool,
}

impl AppConfig {
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            settings: ArchiveOverrides::default(),
            tables: Vec::new(),
            queueing: QueueingConfig::default(),
            enable_logging: true,
        }
    }

    /// Configured table names in declaration order.
    pub fn table_sequence(&self) -> TableSequence {
        TableSequence::new(self.tables.iter().map(TableEntry::name))
    }

    /// Resolved settings for `table`. Tables without an entry get the global
    /// defaults.
    pub fn config_for(&self, table: &str) -> ArchiveConfig {
        let overrides = self
            .tables
            .iter()
            .find(|entry| entry.name() == table)
            .and_then(TableEntry::overrides)
            .cloned()
            .unwrap_or_default();
        ArchiveConfig::build(&self.settings, &overrides)
    }

    /// Every configured table paired with its resolved settings.
    pub fn resolved_tables(&self) -> Vec<(String, ArchiveConfig)> {
        self.table_sequence()
            .iter()
            .map(|table| (table.to_string(), self.config_for(table)))
            .collect()
    }

    /// Structural checks that cannot be defaulted away.
    ///
    /// # Errors
    /// Returns `DbArchiveError::Configuration` when a table name is empty or
    /// listed twice, or when archive tables share the source database and a table resolves
    /// without a prefix (it would be archived into itself).
    pub fn validate(&self) -> Result<()> {
        if let Some(entry) = self.tables.iter().find(|entry| entry.name().trim().is_empty()) {
            return Err(DbArchiveError::Configuration(format!(
                "table entry without a name: {entry:?}"
            )));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(entry) = self.tables.iter().find(|entry| !seen.insert(entry.name().trim())) {
            return Err(DbArchiveError::Configuration(format!(
                "table '{}' is listed more than once",
                entry.name().trim()
            )));
        }

        if self.database.is_same_store() {
            for (table, config) in self.resolved_tables() {
                if config.table_prefix.is_none() {
                    return Err(DbArchiveError::Configuration(format!(
                        "table '{table}' needs a table_prefix when archive tables share the source database"
                    )));
                }
            }
        }

        Ok(())
    }
}
