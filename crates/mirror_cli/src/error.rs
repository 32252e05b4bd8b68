//! CLI error type and exit codes.

use mirror_analytics::AnalyticsError;
use mirror_catalog::CatalogError;
use mirror_store::StoreError;
use mirror_sync_engine::SyncError;
use mirror_sync_server::ServerError;
use thiserror::Error;

/// Result type for command execution.
pub type CliResult<T> = Result<T, CliError>;

/// Exit code of a clean run.
pub const EXIT_OK: u8 = 0;
/// Exit code when a resource failed or the run was aborted.
pub const EXIT_FAILED: u8 = 1;
/// Exit code for configuration mistakes.
pub const EXIT_CONFIG: u8 = 2;

/// Errors surfaced by the commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// Bad flag or environment value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Sync engine error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Local store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// KPI computation error.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// HTTP panel error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Record not present in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Output could not be written or encoded.
    #[error("output error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::InvalidArgument(_) => EXIT_CONFIG,
            CliError::Catalog(CatalogError::UnknownResource(_)) => EXIT_CONFIG,
            CliError::Sync(err) if is_config(err) => EXIT_CONFIG,
            CliError::Analytics(AnalyticsError::InvalidArgument(_)) => EXIT_CONFIG,
            CliError::Server(ServerError::Sync(err)) if is_config(err) => EXIT_CONFIG,
            _ => EXIT_FAILED,
        }
    }
}

fn is_config(err: &SyncError) -> bool {
    matches!(err, SyncError::Config(_) | SyncError::UnknownResource(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(
            CliError::from(SyncError::config("missing key")).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(SyncError::UnknownResource(vec!["x".into()])).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(CatalogError::unknown("x")).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(SyncError::Authentication("denied".into())).exit_code(),
            EXIT_FAILED
        );
        assert_eq!(
            CliError::from(StoreError::Unavailable("locked".into())).exit_code(),
            EXIT_FAILED
        );
        assert_eq!(CliError::NotFound("p1".into()).exit_code(), EXIT_FAILED);
        assert_eq!(
            CliError::from(AnalyticsError::invalid("negative demand")).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(AnalyticsError::MissingResource("sales".into())).exit_code(),
            EXIT_FAILED
        );
    }
}
