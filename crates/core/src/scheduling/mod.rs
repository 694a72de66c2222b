//! Scheduling of archival runs across the configured tables

pub mod group;
pub mod ports;
pub mod scheduler;

pub use group::GroupHooks;
pub use ports::{ArchiveJob, CompletionHook, JobQueue, JobRunner};
pub use scheduler::{Scheduler, TableProgress};
