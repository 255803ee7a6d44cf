//! # Persistence Errors

use thiserror::Error;

/// Result type for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Persistence errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    /// The key-value store failed
    #[error("Store error: {0}")]
    Store(String),

    /// A record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored computation could not be turned into a live one
    #[error("Failed to compile computation: {0}")]
    Compile(String),

    #[error("Persisted field not found: {0}")]
    NotFound(String),

    /// Registering the compiled field or description failed
    #[error("Failed to register persisted field: {0}")]
    Registration(String),
}

impl PersistError {
    pub fn code(&self) -> &'static str {
        match self {
            PersistError::Store(_) => "TYPELENS_STORE_ERROR",
            PersistError::Serialization(_) => "TYPELENS_SERIALIZATION_ERROR",
            PersistError::Compile(_) => "TYPELENS_COMPILE_ERROR",
            PersistError::NotFound(_) => "TYPELENS_PERSISTED_FIELD_NOT_FOUND",
            PersistError::Registration(_) => "TYPELENS_REGISTRATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        PersistError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::Store(err.to_string())
    }
}
