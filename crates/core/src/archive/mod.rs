//! Chunked archival engine

pub mod archiver;
pub mod filter;
pub mod log;
pub mod ports;

pub use archiver::{ArchivalRun, ChunkedArchiver, Clock};
pub use filter::EligibilityFilter;
pub use log::{ArchiveLog, TracingLog};
pub use ports::{ArchiveStore, BatchTransaction};
