//! Errors surfaced to callers of the use cases

use thiserror::Error;

/// Caller-facing error taxonomy.
///
/// `Internal` carries no detail. The underlying fault is logged where it is
/// converted and never shown to the caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error")]
    Internal,
}

impl ServiceError {
    /// Log `source` under `operation` and collapse it into `Internal`
    pub fn internal(operation: &'static str, source: impl std::fmt::Display) -> Self {
        tracing::error!(operation, error = %source, "Operation failed");
        Self::Internal
    }
}
