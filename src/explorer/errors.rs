//! # Explorer Errors

use thiserror::Error;

use crate::persist::PersistError;
use crate::resolve::ResolveError;

/// Result type for explorer operations
pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// Explorer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplorerError {
    /// An id that this explorer never handed out
    #[error("Unknown explorer node: {0}")]
    UnknownNode(String),

    /// Edit or delete on a field that is not user-defined
    #[error("Field \"{0}\" is not a user-defined field")]
    NotUserDefined(String),

    /// A user field would take the name of a field already on the type
    #[error("Type \"{type_name}\" already has a field named \"{name}\"")]
    NameTaken { type_name: String, name: String },

    /// `extend` and user-field edits need a store and a compiler
    #[error("No persistence configured for this explorer")]
    PersistenceDisabled,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl ExplorerError {
    pub fn code(&self) -> &'static str {
        match self {
            ExplorerError::UnknownNode(_) => "TYPELENS_UNKNOWN_NODE",
            ExplorerError::NotUserDefined(_) => "TYPELENS_NOT_USER_DEFINED",
            ExplorerError::NameTaken { .. } => "TYPELENS_NAME_TAKEN",
            ExplorerError::PersistenceDisabled => "TYPELENS_PERSISTENCE_DISABLED",
            ExplorerError::Resolve(err) => err.code(),
            ExplorerError::Persist(err) => err.code(),
        }
    }
}
