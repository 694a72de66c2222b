//! SQLite implementations

pub mod archive_store;
pub mod manager;
pub mod setup;
pub mod sql;

pub use archive_store::SqliteArchiveStore;
pub use manager::{create_database_file, DbConnection, DbManager, ARCHIVE_SCHEMA, SOURCE_SCHEMA};
pub use setup::{SetupReport, SetupService, TableSetup};
