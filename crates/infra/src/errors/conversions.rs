//! Conversions from external infrastructure errors into domain errors.

use dbarchive_domain::DbArchiveError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DbArchiveError);

impl From<InfraError> for DbArchiveError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DbArchiveError> for InfraError {
    fn from(value: DbArchiveError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoDbArchiveError {
    fn into_dbarchive(self) -> DbArchiveError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → DbArchiveError */
/* -------------------------------------------------------------------------- */

impl IntoDbArchiveError for SqlError {
    fn into_dbarchive(self) -> DbArchiveError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        DbArchiveError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        DbArchiveError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        DbArchiveError::Database(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => DbArchiveError::Database(format!(
                        "foreign key constraint violation: {message}"
                    )),
                    (ErrorCode::CannotOpen, _) => {
                        DbArchiveError::Configuration(format!("unable to open database: {message}"))
                    }
                    _ => DbArchiveError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => DbArchiveError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                DbArchiveError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                DbArchiveError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => {
                DbArchiveError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => DbArchiveError::Configuration(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => DbArchiveError::Database("invalid SQL query".into()),
            other => DbArchiveError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_dbarchive())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → DbArchiveError */
/* -------------------------------------------------------------------------- */

impl IntoDbArchiveError for r2d2::Error {
    fn into_dbarchive(self) -> DbArchiveError {
        DbArchiveError::Database(format!("connection pool: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(value.into_dbarchive())
    }
}

/// Shorthand for `rusqlite` results inside the adapters.
pub fn map_sql_error(err: SqlError) -> DbArchiveError {
    DbArchiveError::from(InfraError::from(err))
}

/// Shorthand for pool checkout failures.
pub fn map_pool_error(err: r2d2::Error) -> DbArchiveError {
    DbArchiveError::from(InfraError::from(err))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
