//! Error types for inventory analytics.

use mirror_store::StoreError;
use thiserror::Error;

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Errors that can occur while computing KPIs.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Reading the mirror failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A resource the reports read is missing from the registry.
    #[error("resource not registered: {0}")]
    MissingResource(String),

    /// An input was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl AnalyticsError {
    /// Creates an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
