//! Error types for the catalog.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while resolving resources or building records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// One or more requested resource names are not registered.
    #[error("unknown resource(s): {}", .0.join(", "))]
    UnknownResource(Vec<String>),

    /// Two definitions share the same name.
    #[error("duplicate resource definition: {0}")]
    DuplicateResource(String),

    /// A definition is not usable (bad table name, empty endpoint, ...).
    #[error("invalid resource definition {name}: {reason}")]
    InvalidDefinition {
        /// Resource name.
        name: String,
        /// Why the definition was rejected.
        reason: String,
    },

    /// A remote response did not have a recognized shape.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Endpoint that produced the response.
        endpoint: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl CatalogError {
    /// Creates an unknown-resource error for a single name.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownResource(vec![name.into()])
    }
}
