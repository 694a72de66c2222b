//! Error conversions owned by the infrastructure layer.

mod conversions;

pub use conversions::{map_pool_error, map_sql_error, InfraError};
