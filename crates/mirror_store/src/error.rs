//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred (creating the database directory, ...).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A table name is not a plain identifier.
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    /// The store refused or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be interpreted.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            StoreError::InvalidTable("a b".into()).to_string(),
            "invalid table name: \"a b\""
        );
        assert_eq!(
            StoreError::Unavailable("disk full".into()).to_string(),
            "store unavailable: disk full"
        );
    }
}
