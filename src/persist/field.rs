//! # Persisted Fields
//!
//! Durable form of a user-created extended field or description.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::resolve::{DescriptionRenderer, FieldGetter};

use super::errors::{PersistError, PersistResult};

/// User-editable source of a computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableComputation {
    pub source: String,
}

impl EditableComputation {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Turns stored computations into live getters and renderers
pub trait ComputationCompiler {
    /// Getter for an extended field
    fn compile_getter(&self, computation: &EditableComputation) -> PersistResult<FieldGetter>;

    /// Renderer for a non-primary description
    fn compile_renderer(&self, computation: &EditableComputation) -> PersistResult<DescriptionRenderer>;
}

/// A user-defined field as stored, keyed by `unique_id`
///
/// `result_type_name` is `None` for descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedField {
    #[serde(skip)]
    pub unique_id: String,
    pub module: String,
    pub type_name: String,
    pub name: String,
    pub result_type_name: Option<String>,
    pub computation: EditableComputation,
}

impl PersistedField {
    /// New record with a fresh id
    pub fn new(
        module: impl Into<String>,
        type_name: impl Into<String>,
        name: impl Into<String>,
        result_type_name: Option<String>,
        computation: EditableComputation,
    ) -> Self {
        Self {
            unique_id: generate_id(),
            module: module.into(),
            type_name: type_name.into(),
            name: name.into(),
            result_type_name,
            computation,
        }
    }

    /// Decode a stored value under its key
    pub fn from_stored(unique_id: &str, value: Value) -> PersistResult<Self> {
        let mut field: PersistedField = serde_json::from_value(value)?;
        field.unique_id = unique_id.to_string();
        Ok(field)
    }

    pub fn to_stored(&self) -> PersistResult<Value> {
        serde_json::to_value(self).map_err(PersistError::from)
    }

    pub fn is_description(&self) -> bool {
        self.result_type_name.is_none()
    }
}

/// `UserField-<unix millis>-<random>`
fn generate_id() -> String {
    format!(
        "UserField-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}
