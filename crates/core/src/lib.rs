//! # dbarchive Core
//!
//! Archival engine and scheduling logic - no storage or runtime code.
//!
//! This crate contains:
//! - The chunked archiver that moves one table's eligible rows per run
//! - The scheduler that chains runs and tables together
//! - Port interfaces (traits) for stores, queues and logging
//!
//! ## Architecture Principles
//! - Only depends on `dbarchive-domain`
//! - No SQL, file or thread-pool code
//! - All external dependencies via traits

pub mod archive;
pub mod scheduling;

pub use archive::{
    ArchivalRun, ArchiveLog, ArchiveStore, BatchTransaction, ChunkedArchiver, EligibilityFilter,
    TracingLog,
};
pub use scheduling::{
    ArchiveJob, CompletionHook, GroupHooks, JobQueue, JobRunner, Scheduler, TableProgress,
};
