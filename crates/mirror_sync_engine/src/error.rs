//! Error types for the sync engine.

use mirror_catalog::CatalogError;
use mirror_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Collaborator-level errors (`Transport`, `Protocol`) are mapped by the
/// fetcher into `Fetch` or `Authentication` before they reach a run summary.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote rejected the credentials. Aborts the whole run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Fetching a resource failed for good (retries exhausted, malformed
    /// response, rejected request).
    #[error("fetch failed for {resource}: {message}")]
    Fetch {
        /// Resource being fetched.
        resource: String,
        /// Underlying failure.
        message: String,
    },

    /// A batch commit or watermark write failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// One or more requested resources are not registered.
    #[error("unknown resource(s): {}", .0.join(", "))]
    UnknownResource(Vec<String>),

    /// The run was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// The remote answered with something that is not a page.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Another run is already active.
    #[error("a sync run is already in progress")]
    AlreadyRunning,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport {
                retryable: true,
                ..
            }
        )
    }

    /// Returns true if this error ends the whole run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Authentication(_)
                | SyncError::UnknownResource(_)
                | SyncError::Config(_)
                | SyncError::AlreadyRunning
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Authentication(_) => "authentication",
            SyncError::Fetch { .. } => "fetch",
            SyncError::Persistence(_) => "persistence",
            SyncError::UnknownResource(_) => "unknown_resource",
            SyncError::Cancelled => "cancelled",
            SyncError::Transport { .. } => "transport",
            SyncError::Protocol(_) => "protocol",
            SyncError::Config(_) => "config",
            SyncError::AlreadyRunning => "already_running",
        }
    }
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownResource(names) => SyncError::UnknownResource(names),
            CatalogError::MalformedResponse { .. } => SyncError::Protocol(err.to_string()),
            CatalogError::DuplicateResource(_) | CatalogError::InvalidDefinition { .. } => {
                SyncError::Config(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad request").is_retryable());
        assert!(!SyncError::Authentication("401".into()).is_retryable());
        assert!(!SyncError::Protocol("not json".into()).is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
    }

    #[test]
    fn run_fatal_errors() {
        assert!(SyncError::Authentication("x".into()).is_run_fatal());
        assert!(SyncError::AlreadyRunning.is_run_fatal());
        assert!(!SyncError::Cancelled.is_run_fatal());
        assert!(!SyncError::Fetch {
            resource: "products".into(),
            message: "x".into()
        }
        .is_run_fatal());
    }

    #[test]
    fn catalog_errors_map_into_taxonomy() {
        let err: SyncError = CatalogError::UnknownResource(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.kind(), "unknown_resource");
        assert_eq!(err.to_string(), "unknown resource(s): a, b");

        let err: SyncError = CatalogError::MalformedResponse {
            endpoint: "producto/".into(),
            reason: "boom".into(),
        }
        .into();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn store_errors_are_persistence() {
        let err: SyncError = StoreError::Unavailable("disk full".into()).into();
        assert_eq!(err.kind(), "persistence");
        assert_eq!(err.to_string(), "persistence error: store unavailable: disk full");
    }
}
