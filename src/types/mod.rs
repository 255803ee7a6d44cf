//! # Types and Objects
//!
//! Typed object references and the boundary to the type-introspection
//! provider that answers questions about them.

pub mod errors;
pub mod memory;
pub mod object;
pub mod provider;

pub use errors::{IntrospectionError, IntrospectionResult};
pub use memory::{StaticTypeSystem, TypeDef};
pub use object::{DbgObject, FieldDescriptor, ScalarValue, TypeRef};
pub use provider::{BaseTypeCache, IntrospectionFuture, TypeProvider};
