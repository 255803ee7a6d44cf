//! # Type-Extension Registry
//!
//! Named extensions attached to types by exact name or predicate, with
//! change notification scoped to `(module, type name)`.

pub mod errors;
pub mod extension;
pub mod key;

pub use errors::{RegistryError, RegistryResult};
pub use extension::{
    ExtensionChange, ExtensionOperation, ExtensionPayload, ListenerId, RegisteredExtension,
    TypeExtension,
};
pub use key::{TypeKey, TypePredicate};
