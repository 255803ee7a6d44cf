//! # Introspection Errors

use thiserror::Error;

/// Result type for type-introspection operations
pub type IntrospectionResult<T> = Result<T, IntrospectionError>;

/// Errors raised by a type-introspection provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    /// The provider has no information about the type
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// The type has no field with the given name
    #[error("Type {type_name} has no field named {field}")]
    UnknownField { type_name: String, field: String },

    /// Dereference of a non-pointer object
    #[error("Type {0} is not a pointer")]
    NotAPointer(String),

    /// Indexing a non-array object, or index past the end
    #[error("Index {index} is out of range for {type_name}")]
    IndexOutOfRange { type_name: String, index: usize },

    /// Enum constant lookup on a non-enum, or value without a constant
    #[error("No enum constant for {type_name} value {value}")]
    NoEnumConstant { type_name: String, value: String },

    /// Memory at the address could not be read
    #[error("Unable to read memory at 0x{0:x}")]
    MemoryUnreadable(u64),

    /// The provider itself is not reachable
    #[error("Introspection provider unavailable: {0}")]
    Unavailable(String),
}

impl IntrospectionError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IntrospectionError::UnknownType(_) => "TYPELENS_UNKNOWN_TYPE",
            IntrospectionError::UnknownField { .. } => "TYPELENS_UNKNOWN_NATIVE_FIELD",
            IntrospectionError::NotAPointer(_) => "TYPELENS_NOT_A_POINTER",
            IntrospectionError::IndexOutOfRange { .. } => "TYPELENS_INDEX_OUT_OF_RANGE",
            IntrospectionError::NoEnumConstant { .. } => "TYPELENS_NO_ENUM_CONSTANT",
            IntrospectionError::MemoryUnreadable(_) => "TYPELENS_MEMORY_UNREADABLE",
            IntrospectionError::Unavailable(_) => "TYPELENS_PROVIDER_UNAVAILABLE",
        }
    }
}
