//! Observable events for typelens
//!
//! Every log line carries one of these as its `event` key.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Registry
    /// Extension registered
    ExtensionAdded,
    /// Extension removed
    ExtensionRemoved,
    /// Extension renamed in place
    ExtensionRenamed,
    /// Extended field result type changed
    ExtensionRetyped,

    // Resolution
    /// Custom description failed, fallback text shown
    DescriptionFallback,
    /// Extended field produced an object of an unrelated type
    TypeMismatch,
    /// Base-type discovery failed
    BaseTypesFailed,

    // Explorer
    /// Field enabled by the user
    FieldEnabled,
    /// Field disabled
    FieldDisabled,
    /// Child aggregate created for a field
    ChildTypeCreated,

    // Persistence
    /// Persisted fields loaded from the store
    PersistedFieldsLoaded,
    /// A persisted record was skipped during load
    PersistedFieldSkipped,
    /// A persisted field was written
    PersistedFieldSaved,
    /// A persisted field was deleted
    PersistedFieldDeleted,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ExtensionAdded => "EXTENSION_ADDED",
            Event::ExtensionRemoved => "EXTENSION_REMOVED",
            Event::ExtensionRenamed => "EXTENSION_RENAMED",
            Event::ExtensionRetyped => "EXTENSION_RETYPED",

            Event::DescriptionFallback => "DESCRIPTION_FALLBACK",
            Event::TypeMismatch => "TYPE_MISMATCH",
            Event::BaseTypesFailed => "BASE_TYPES_FAILED",

            Event::FieldEnabled => "FIELD_ENABLED",
            Event::FieldDisabled => "FIELD_DISABLED",
            Event::ChildTypeCreated => "CHILD_TYPE_CREATED",

            Event::PersistedFieldsLoaded => "PERSISTED_FIELDS_LOADED",
            Event::PersistedFieldSkipped => "PERSISTED_FIELD_SKIPPED",
            Event::PersistedFieldSaved => "PERSISTED_FIELD_SAVED",
            Event::PersistedFieldDeleted => "PERSISTED_FIELD_DELETED",

            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Default severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::DescriptionFallback
            | Event::TypeMismatch
            | Event::BaseTypesFailed
            | Event::PersistedFieldSkipped => Severity::Warn,
            Event::PersistedFieldsLoaded | Event::ConfigLoaded => Severity::Info,
            _ => Severity::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
