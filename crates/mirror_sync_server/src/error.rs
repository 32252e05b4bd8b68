//! Error types for the HTTP panel.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mirror_analytics::AnalyticsError;
use mirror_store::StoreError;
use mirror_sync_engine::SyncError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Errors that can occur in the HTTP panel.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown resource or record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Error from the sync engine.
    #[error("{0}")]
    Sync(#[from] SyncError),

    /// Error from the local store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from a KPI computation.
    #[error("{0}")]
    Analytics(#[from] AnalyticsError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status of this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Sync(err) => match err {
                SyncError::AlreadyRunning => StatusCode::CONFLICT,
                SyncError::UnknownResource(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Analytics(AnalyticsError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ServerError::Analytics(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Store(_) | ServerError::Internal(_) | ServerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            error!(status = code.as_u16(), "request failed: {self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (code, Json(body)).into_response()
    }
}
