//! Error types for liteorm

use crate::validate::ValidationErrors;
use thiserror::Error;

/// Result type alias for liteorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Boxed driver error kept as the cause of a [`OrmError::DataAccess`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for database operations.
///
/// The split between [`OrmError::Configuration`] and [`OrmError::DataAccess`]
/// lets callers tell "the statement was built wrong" apart from "the statement
/// was fine but the database refused it". Only the latter is worth retrying.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Caller misuse: missing table, disallowed operator, empty payload,
    /// unguarded UPDATE/DELETE, re-execution of a spent session.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the database handle.
    #[error("Data access error: {message}")]
    DataAccess {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation rules failed
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),
}

impl OrmError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a data access error with an optional underlying cause
    pub fn data_access<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::DataAccess {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    /// Create a data access error without an underlying cause
    pub fn data_access_msg(message: impl Into<String>) -> Self {
        Self::DataAccess {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a configuration (caller misuse) error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this error came from the database handle
    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Map a tokio_postgres error, keeping the SQLSTATE in the message when present.
    pub fn from_pg_error(err: tokio_postgres::Error) -> Self {
        let message = match err.as_db_error() {
            Some(db_err) => format!("[{}] {}", db_err.code().code(), db_err.message()),
            None => err.to_string(),
        };
        Self::data_access(message, err)
    }
}

impl From<ValidationErrors> for OrmError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::data_access(format!("Pool error: {err}"), err)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for OrmError {
    fn from(err: mysql_async::Error) -> Self {
        Self::data_access(err.to_string(), err)
    }
}
