//! Error types for Ripple.

use crate::record::RecordId;
use thiserror::Error;

/// Result type alias for Ripple operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A raw record could not be turned into an item.
///
/// Returned by caller-supplied conversion functions, typically because a
/// related record has not been synced yet.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot convert record {record}: {reason}")]
pub struct ConversionError {
    /// The record that failed to convert.
    pub record: RecordId,
    /// Human readable reason.
    pub reason: String,
}

impl ConversionError {
    /// Creates a conversion error for a record.
    pub fn new(record: RecordId, reason: impl Into<String>) -> Self {
        Self {
            record,
            reason: reason.into(),
        }
    }

    /// Creates a conversion error for a missing required field.
    pub fn missing_field(record: RecordId, field: &str) -> Self {
        Self::new(record, format!("missing field `{field}`"))
    }
}

/// Error types for Ripple operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The initial fetch of a live query failed.
    #[error("fetch failed for query on `{query}`: {message}")]
    Fetch { query: String, message: String },
    /// A raw record could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// A query could not be registered.
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },
    /// Table not found.
    #[error("table not found: {name}")]
    TableNotFound { name: String },
    /// Row not found.
    #[error("record {id} not found in table {table}")]
    NotFound { table: String, id: RecordId },
    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
    /// A serial queue or context is no longer running.
    #[error("{what} has shut down")]
    Disconnected { what: String },
}

impl Error {
    /// Creates a fetch failure.
    pub fn fetch(query: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Fetch {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates a not found error.
    pub fn not_found(table: impl Into<String>, id: RecordId) -> Self {
        Error::NotFound {
            table: table.into(),
            id,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a disconnected error.
    pub fn disconnected(what: impl Into<String>) -> Self {
        Error::Disconnected { what: what.into() }
    }

    /// Returns true for failures that must stop observation from starting.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::TableNotFound { .. } | Error::InvalidQuery { .. })
    }
}
