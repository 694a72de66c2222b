//! # dbarchive Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - The SQLite archive store and schema setup (rusqlite + r2d2)
//! - Configuration file loading with environment overrides
//! - The Tokio job queue
//! - Tracing subscriber initialization
//!
//! ## Architecture
//! - Implements traits defined in `dbarchive-core`
//! - Depends on `dbarchive-domain` and `dbarchive-core`
//! - Contains all "impure" code (I/O, threads)

pub mod config;
pub mod database;
pub mod errors;
pub mod logging;
pub mod queue;

// Re-export commonly used items
pub use database::{DbManager, SetupReport, SetupService, SqliteArchiveStore, TableSetup};
pub use errors::InfraError;
pub use logging::{init_tracing, LogFormat};
pub use queue::{QueueConfig, QueueError, TokioJobQueue};
