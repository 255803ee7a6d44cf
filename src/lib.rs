//! typelens - object introspection for debugger visualizations
//!
//! Given a typed reference into debuggee memory, typelens resolves
//! human-readable descriptions and code-defined "extended fields" for the
//! object's type, falling back through the type's base types. The explorer
//! models a type and its base types as one browsable unit whose fields can
//! be enabled, filtered, and extended by the user.

pub mod cli;
pub mod config;
pub mod explorer;
pub mod observability;
pub mod persist;
pub mod registry;
pub mod resolve;
pub mod types;

pub use config::LensConfig;
pub use explorer::TypeExplorer;
pub use resolve::{Description, Inspector};
pub use types::{DbgObject, TypeProvider, TypeRef};
