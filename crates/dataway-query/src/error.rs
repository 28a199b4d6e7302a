use dataway_core::ClauseError;
use thiserror::Error;

/// Unified error type for all adapter operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Connection failed (authentication, network, etc.)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema/introspection error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// No live adapter is registered for this data-source id. Callers map
    /// this to a 404-style response, not a generic failure.
    #[error("No adapter registered for source: {0}")]
    AdapterNotFound(String),

    /// No factory is registered for this backend type tag
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    /// Row decoding / serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filter clause could not be compiled
    #[error("Clause error: {0}")]
    Clause(#[from] ClauseError),
}

impl DataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::AdapterNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
