//! Common error types used across all dataway services

use crate::condition::ClauseError;
use thiserror::Error;

/// Common service error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Clause error: {0}")]
    Clause(#[from] ClauseError),

    #[error("Backend error: source {source_id} ({backend}): {message}")]
    Backend {
        source_id: String,
        backend: String,
        message: String,
    },

    #[error("No live adapter registered for source: {source_id}")]
    BackendUnavailable { source_id: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        ServiceError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest {
            message: message.into(),
        }
    }

    pub fn backend(
        source_id: impl Into<String>,
        backend: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ServiceError::Backend {
            source_id: source_id.into(),
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn backend_unavailable(source_id: impl Into<String>) -> Self {
        ServiceError::BackendUnavailable {
            source_id: source_id.into(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
