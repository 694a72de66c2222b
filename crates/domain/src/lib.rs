//! # dbarchive Domain
//!
//! Domain types for chunked table archival.
//!
//! This crate contains:
//! - Per-table archive settings and their merge rules
//! - Row, value and predicate types shared by the engine and the adapters
//! - Run outcomes and the per-table lifecycle state
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other dbarchive crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
