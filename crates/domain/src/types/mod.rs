//! Domain types and models

pub mod outcome;
pub mod predicate;
pub mod sequence;
pub mod value;

pub use outcome::{RunOutcome, RunStatus, TableState};
pub use predicate::{normalise_conditions, ComparisonOp, Predicate, RawCondition};
pub use sequence::TableSequence;
pub use value::{ArchiveRow, SqlValue};
