//! # Type Explorer
//!
//! Browsable model of a type together with its base types: expansion and
//! base-type inclusion state, fuzzy filtering, lazily created child types,
//! field enablement, and user-defined fields.

mod controller;
pub mod errors;
pub mod fuzzy;
pub mod node;
mod path;
mod render;
mod user;

pub use controller::TypeExplorer;
pub use errors::{ExplorerError, ExplorerResult};
pub use fuzzy::fuzzy_match;
pub use node::{
    AggregateId, FieldChange, FieldChangeKind, FieldEntry, FieldId, FieldList, FieldRendering,
    FieldSource, FieldView, SingleTypeId,
};
