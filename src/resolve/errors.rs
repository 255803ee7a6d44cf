//! # Resolution Errors

use thiserror::Error;

use crate::registry::RegistryError;
use crate::types::IntrospectionError;

/// Result type for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Malformed registration name
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No extension anywhere in the base-type chain
    #[error("No extended field \"{field}\" on {module}!{type_name} or any of its base types")]
    UnknownField {
        module: String,
        type_name: String,
        field: String,
    },

    /// Computed value is not the declared result type or derived from it
    #[error("The field \"{field}\" was supposed to be type \"{expected}\" but was unrelated type \"{actual}\"")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// A user-supplied computation failed
    #[error("Custom computation failed: {0}")]
    CustomComputation(String),

    /// The introspection provider failed
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

impl ResolveError {
    /// Failure raised from inside a user computation
    pub fn computation(message: impl Into<String>) -> Self {
        ResolveError::CustomComputation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::Registry(err) => err.code(),
            ResolveError::UnknownField { .. } => "TYPELENS_UNKNOWN_FIELD",
            ResolveError::TypeMismatch { .. } => "TYPELENS_TYPE_MISMATCH",
            ResolveError::CustomComputation(_) => "TYPELENS_CUSTOM_COMPUTATION_FAILED",
            ResolveError::Introspection(err) => err.code(),
        }
    }
}
