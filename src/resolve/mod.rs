//! # Resolution
//!
//! Extended fields, descriptions, and the search that resolves both through
//! a type's base-type chain.

pub mod description;
pub mod descriptions;
pub mod errors;
pub mod fields;
pub mod inspector;
mod search;

pub use description::Description;
pub use descriptions::{DescriptionRenderer, TypeDescription, PRIMARY_DESCRIPTION_NAME};
pub use errors::{ResolveError, ResolveResult};
pub use fields::{ExtendedField, FieldGetter};
pub use inspector::Inspector;
