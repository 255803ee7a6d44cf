//! # Explorer Nodes
//!
//! The explorer's tree lives in an arena: aggregates own single types, single
//! types own fields, and a field may own one child aggregate. Nodes refer to
//! each other by id only, so teardown never fights a reference cycle.

use std::fmt;
use std::str::FromStr;

use crate::persist::EditableComputation;
use crate::registry::ListenerId;
use crate::resolve::{DescriptionRenderer, Description};
use crate::types::TypeRef;

use super::errors::ExplorerError;

/// An aggregate type: a type browsed together with its base types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregateId(pub(crate) usize);

/// One concrete type inside an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SingleTypeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub(crate) usize);

/// Which collection of its single type a field lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSource {
    /// Native fields from type information
    Fields,
    ExtendedFields,
    /// Non-primary descriptions
    Descriptions,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSource::Fields => "fields",
            FieldSource::ExtendedFields => "extendedFields",
            FieldSource::Descriptions => "descriptions",
        }
    }
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldSource {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fields" => Ok(FieldSource::Fields),
            "extendedFields" => Ok(FieldSource::ExtendedFields),
            "descriptions" => Ok(FieldSource::Descriptions),
            other => Err(ExplorerError::UnknownNode(format!("field source {}", other))),
        }
    }
}

/// Whether a field was enabled or disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChangeKind {
    Enabled,
    Disabled,
}

impl FieldChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldChangeKind::Enabled => "enabled",
            FieldChangeKind::Disabled => "disabled",
        }
    }
}

/// Delivered to `on_field_change` subscribers
///
/// Subscribers cannot call back into the explorer from the callback. To show
/// an enabled field, keep `field` and pass it to
/// [`TypeExplorer::render_field`](super::TypeExplorer::render_field) once the
/// call that triggered the change returns.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub field: FieldId,
    /// `[typeName, source, fieldName, ...]` from the root aggregate down
    pub path: Vec<String>,
    /// Dotted name from the root, the label `render_field` will use
    pub label: String,
    pub source: FieldSource,
    pub kind: FieldChangeKind,
    /// Source of the field's computation when it is user-defined
    pub computation: Option<EditableComputation>,
}

/// Read-only snapshot of a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub id: FieldId,
    pub name: String,
    pub result_type_name: Option<String>,
    pub source: FieldSource,
    /// Type that declares the field
    pub declaring_type: TypeRef,
    pub is_enabled: bool,
    /// Child aggregate, if it has been created
    pub child: Option<AggregateId>,
    /// Set for user-defined fields, which can be edited and deleted
    pub persisted_id: Option<String>,
}

/// One row of a rendered field list
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub field: FieldId,
    /// Dotted path from the rendering aggregate, qualified on collision
    pub display_name: String,
    pub type_name: Option<String>,
    pub source: FieldSource,
    pub is_enabled: bool,
    /// Hidden by the rendering aggregate's search query
    pub is_filtered: bool,
    /// Every type between the field and the root is expanded and unfiltered
    pub show_type: bool,
}

/// Fields to render for one aggregate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldList {
    /// Extended fields, then descriptions
    pub extended: Vec<FieldEntry>,
    /// Native fields
    pub fields: Vec<FieldEntry>,
}

/// Result of rendering one field against a live object
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRendering {
    /// `label` is the dotted field path from the root
    Rendered { label: String, description: Description },
    /// The getter chain produced a null object
    Nothing,
    /// Some step failed; the message is shown in place of the value
    Failed { label: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildType {
    Unresolved,
    Absent,
    Present(AggregateId),
}

#[derive(Clone)]
pub(crate) enum FieldKind {
    Native,
    Extended,
    Description(DescriptionRenderer),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Native => write!(f, "Native"),
            FieldKind::Extended => write!(f, "Extended"),
            FieldKind::Description(_) => write!(f, "Description"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct AggregateNode {
    pub parent_field: Option<FieldId>,
    /// Primary type first, then base types nearest-first
    pub backing_types: Vec<SingleTypeId>,
    pub search_query: String,
    pub include_base_types: bool,
    pub prepared: bool,
}

#[derive(Debug)]
pub(crate) struct SingleTypeNode {
    pub aggregate: AggregateId,
    pub type_ref: TypeRef,
    pub is_expanded: bool,
    /// Loaded on first use
    pub fields: Option<Vec<FieldId>>,
    pub extended_fields: Vec<FieldId>,
    pub descriptions: Vec<FieldId>,
    /// Registry subscriptions; `None` once torn down
    pub listeners: Option<(ListenerId, ListenerId)>,
}

impl SingleTypeNode {
    pub fn collection(&self, source: FieldSource) -> &[FieldId] {
        match source {
            FieldSource::Fields => self.fields.as_deref().unwrap_or(&[]),
            FieldSource::ExtendedFields => &self.extended_fields,
            FieldSource::Descriptions => &self.descriptions,
        }
    }

    pub fn all_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.collection(FieldSource::Fields)
            .iter()
            .chain(self.extended_fields.iter())
            .chain(self.descriptions.iter())
            .copied()
    }
}

#[derive(Debug)]
pub(crate) struct FieldNode {
    pub name: String,
    pub result_type_name: Option<String>,
    pub parent_type: SingleTypeId,
    pub source: FieldSource,
    pub kind: FieldKind,
    pub is_enabled: bool,
    pub child_type: ChildType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_names_round_trip_through_paths() {
        for source in [FieldSource::Fields, FieldSource::ExtendedFields, FieldSource::Descriptions] {
            assert_eq!(source.as_str().parse::<FieldSource>().unwrap(), source);
        }
        assert!("nothing".parse::<FieldSource>().is_err());
    }
}
