//! # Registry Errors

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Extension names are path segments and cannot contain `.`
    #[error("Invalid extension name \"{0}\": names cannot contain '.'")]
    InvalidName(String),
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::InvalidName(_) => "TYPELENS_INVALID_NAME",
        }
    }
}
