//! # Persistence
//!
//! User-defined fields survive restarts through an external key-value
//! store. Stored computations are compiled back into live getters by a
//! `ComputationCompiler` supplied by the embedder.

pub mod collection;
pub mod errors;
pub mod field;
pub mod store;

pub use collection::PersistedFieldCollection;
pub use errors::{PersistError, PersistResult};
pub use field::{ComputationCompiler, EditableComputation, PersistedField};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreFuture};
