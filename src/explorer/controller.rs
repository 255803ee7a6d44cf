//! # Type Explorer
//!
//! Controller for one explored root type. Owns the node arena, applies
//! registry changes to live fields, and reports every enable/disable to
//! `on_field_change` subscribers.
//!
//! Registry listeners run synchronously inside registration calls, so they
//! only queue the change on an unbounded channel; `sync()` applies the queue
//! to the tree.

use std::rc::Rc;

use tokio::sync::mpsc;

use crate::config::LensConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::persist::{ComputationCompiler, PersistedFieldCollection};
use crate::registry::{ExtensionChange, ExtensionOperation};
use crate::resolve::{DescriptionRenderer, ExtendedField, Inspector, ResolveError, TypeDescription};
use crate::types::TypeRef;

use super::errors::{ExplorerError, ExplorerResult};
use super::node::{
    AggregateId, AggregateNode, ChildType, FieldChange, FieldChangeKind, FieldId, FieldKind,
    FieldNode, FieldSource, FieldView, SingleTypeId, SingleTypeNode,
};

/// A registry change queued for one single type
#[derive(Debug)]
pub(crate) enum RegistryUpdate {
    ExtendedField(SingleTypeId, ExtensionChange<ExtendedField>),
    Description(SingleTypeId, ExtensionChange<TypeDescription>),
}

pub(crate) struct Persistence {
    pub collection: Rc<PersistedFieldCollection>,
    pub compiler: Rc<dyn ComputationCompiler>,
}

type FieldChangeCallback = Box<dyn Fn(&FieldChange)>;

/// Interactive model of a type, its base types, and their fields
pub struct TypeExplorer {
    pub(crate) inspector: Rc<Inspector>,
    pub(crate) config: LensConfig,
    pub(crate) aggregates: Vec<AggregateNode>,
    pub(crate) single_types: Vec<SingleTypeNode>,
    pub(crate) fields: Vec<FieldNode>,
    root: AggregateId,
    updates_tx: mpsc::UnboundedSender<RegistryUpdate>,
    updates_rx: mpsc::UnboundedReceiver<RegistryUpdate>,
    field_listeners: Vec<FieldChangeCallback>,
    pub(crate) persistence: Option<Persistence>,
    /// Fields created by `extend` that enable themselves once they appear
    pub(crate) pending_auto_enable: Vec<(AggregateId, TypeRef, String)>,
}

impl TypeExplorer {
    /// Explorer rooted at `root_type`
    pub fn new(inspector: Rc<Inspector>, root_type: TypeRef, config: LensConfig) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let mut explorer = Self {
            inspector,
            config,
            aggregates: Vec::new(),
            single_types: Vec::new(),
            fields: Vec::new(),
            root: AggregateId(0),
            updates_tx,
            updates_rx,
            field_listeners: Vec::new(),
            persistence: None,
            pending_auto_enable: Vec::new(),
        };
        explorer.root = explorer.new_aggregate(root_type, None);
        explorer
    }

    /// Enable user-defined fields backed by `collection`
    pub fn with_persistence(
        mut self,
        collection: Rc<PersistedFieldCollection>,
        compiler: Rc<dyn ComputationCompiler>,
    ) -> Self {
        self.persistence = Some(Persistence {
            collection,
            compiler,
        });
        self
    }

    pub fn inspector(&self) -> &Rc<Inspector> {
        &self.inspector
    }

    pub fn root(&self) -> AggregateId {
        self.root
    }

    /// Subscribe to field enable/disable events
    pub fn on_field_change(&mut self, callback: impl Fn(&FieldChange) + 'static) {
        self.field_listeners.push(Box::new(callback));
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    pub(crate) fn new_aggregate(&mut self, type_ref: TypeRef, parent_field: Option<FieldId>) -> AggregateId {
        let id = AggregateId(self.aggregates.len());
        self.aggregates.push(AggregateNode {
            parent_field,
            backing_types: Vec::new(),
            search_query: String::new(),
            include_base_types: false,
            prepared: false,
        });
        let primary = self.new_single_type(id, type_ref);
        self.aggregates[id.0].backing_types.push(primary);
        id
    }

    fn new_single_type(&mut self, aggregate: AggregateId, type_ref: TypeRef) -> SingleTypeId {
        let id = SingleTypeId(self.single_types.len());

        let tx = self.updates_tx.clone();
        let fields_listener =
            self.inspector
                .on_extended_fields_changed(&type_ref.module, &type_ref.name, move |change| {
                    let _ = tx.send(RegistryUpdate::ExtendedField(id, change.clone()));
                });
        let tx = self.updates_tx.clone();
        let descriptions_listener =
            self.inspector
                .on_descriptions_changed(&type_ref.module, &type_ref.name, move |change| {
                    let _ = tx.send(RegistryUpdate::Description(id, change.clone()));
                });

        let extended = self
            .inspector
            .get_extended_fields(&type_ref.module, &type_ref.name);
        let descriptions = self.inspector.get_descriptions(&type_ref.module, &type_ref.name);

        self.single_types.push(SingleTypeNode {
            aggregate,
            type_ref,
            is_expanded: false,
            fields: None,
            extended_fields: Vec::new(),
            descriptions: Vec::new(),
            listeners: Some((fields_listener, descriptions_listener)),
        });

        for registered in extended {
            self.add_extended_field_node(id, &registered.name, &registered.extension.result_type_name);
        }
        for registered in descriptions.into_iter().filter(|r| !r.extension.is_primary) {
            self.add_description_node(id, &registered.name, registered.extension.renderer);
        }
        id
    }

    pub(crate) fn new_field_node(
        &mut self,
        parent_type: SingleTypeId,
        name: &str,
        result_type_name: Option<String>,
        source: FieldSource,
        kind: FieldKind,
    ) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(FieldNode {
            name: name.to_string(),
            result_type_name,
            parent_type,
            source,
            kind,
            is_enabled: false,
            child_type: ChildType::Unresolved,
        });
        id
    }

    fn add_extended_field_node(&mut self, single: SingleTypeId, name: &str, result_type_name: &str) {
        let id = self.new_field_node(
            single,
            name,
            Some(result_type_name.to_string()),
            FieldSource::ExtendedFields,
            FieldKind::Extended,
        );
        self.single_types[single.0].extended_fields.push(id);
        self.auto_enable(single, id);
    }

    fn add_description_node(&mut self, single: SingleTypeId, name: &str, renderer: DescriptionRenderer) {
        let id = self.new_field_node(
            single,
            name,
            None,
            FieldSource::Descriptions,
            FieldKind::Description(renderer),
        );
        self.single_types[single.0].descriptions.push(id);
        self.auto_enable(single, id);
    }

    fn auto_enable(&mut self, single: SingleTypeId, field: FieldId) {
        let node = &self.single_types[single.0];
        let name = &self.fields[field.0].name;
        let position = self.pending_auto_enable.iter().position(|(aggregate, type_ref, pending)| {
            *aggregate == node.aggregate && *type_ref == node.type_ref && pending == name
        });
        if let Some(index) = position {
            self.pending_auto_enable.remove(index);
            self.set_enabled(field, true);
        }
    }

    /// Native fields of a single type, loaded once
    pub(crate) async fn load_fields(&mut self, single: SingleTypeId) -> ExplorerResult<Vec<FieldId>> {
        if let Some(fields) = &self.single_types[single.0].fields {
            return Ok(fields.clone());
        }

        let type_ref = self.single_types[single.0].type_ref.clone();
        let descriptors = self
            .inspector
            .provider()
            .fields(&type_ref, false)
            .await
            .map_err(ResolveError::from)?;

        let ids: Vec<FieldId> = descriptors
            .iter()
            .map(|descriptor| {
                self.new_field_node(
                    single,
                    &descriptor.name,
                    Some(descriptor.dereferenced_type_name().to_string()),
                    FieldSource::Fields,
                    FieldKind::Native,
                )
            })
            .collect();
        self.single_types[single.0].fields = Some(ids.clone());
        Ok(ids)
    }

    // =========================================================================
    // Aggregate state
    // =========================================================================

    /// One-time base-type discovery and `include_base_types` default
    pub async fn prepare_for_rendering(&mut self, aggregate: AggregateId) -> ExplorerResult<()> {
        self.check_aggregate(aggregate)?;
        if self.aggregates[aggregate.0].prepared {
            return Ok(());
        }
        let Some(&primary) = self.aggregates[aggregate.0].backing_types.first() else {
            return Ok(());
        };

        let type_ref = self.single_types[primary.0].type_ref.clone();
        let bases = self.inspector.base_types(&type_ref).await?;
        if self.aggregates[aggregate.0].backing_types.len() == 1 {
            for base in bases {
                let single = self.new_single_type(aggregate, base);
                self.aggregates[aggregate.0].backing_types.push(single);
            }
        }

        let own_fields = self.load_fields(primary).await?;
        let node = &mut self.aggregates[aggregate.0];
        node.include_base_types = self.config.auto_include_base_types && own_fields.is_empty();
        node.prepared = true;
        Ok(())
    }

    /// Flip expansion of the primary type; base types follow only while included
    pub fn toggle_expansion(&mut self, aggregate: AggregateId) -> ExplorerResult<()> {
        self.check_aggregate(aggregate)?;
        let node = &self.aggregates[aggregate.0];
        let include = node.include_base_types;
        for (i, single) in node.backing_types.iter().enumerate() {
            let single = &mut self.single_types[single.0];
            single.is_expanded = !single.is_expanded && (i == 0 || include);
        }
        Ok(())
    }

    /// Flip `include_base_types`; base types take the primary's expansion
    pub fn toggle_include_base_types(&mut self, aggregate: AggregateId) -> ExplorerResult<()> {
        self.check_aggregate(aggregate)?;
        let node = &mut self.aggregates[aggregate.0];
        node.include_base_types = !node.include_base_types;
        let include = node.include_base_types;
        let Some(&primary) = node.backing_types.first() else {
            return Ok(());
        };
        let expanded = self.single_types[primary.0].is_expanded;
        for single in node.backing_types.iter().skip(1) {
            self.single_types[single.0].is_expanded = include && expanded;
        }
        Ok(())
    }

    pub fn set_search_query(&mut self, aggregate: AggregateId, query: &str) -> ExplorerResult<()> {
        self.check_aggregate(aggregate)?;
        self.aggregates[aggregate.0].search_query = query.to_string();
        Ok(())
    }

    pub fn is_expanded(&self, aggregate: AggregateId) -> ExplorerResult<bool> {
        self.check_aggregate(aggregate)?;
        Ok(self.aggregates[aggregate.0]
            .backing_types
            .first()
            .map_or(false, |single| self.single_types[single.0].is_expanded))
    }

    pub fn include_base_types(&self, aggregate: AggregateId) -> ExplorerResult<bool> {
        self.check_aggregate(aggregate)?;
        Ok(self.aggregates[aggregate.0].include_base_types)
    }

    pub fn is_prepared(&self, aggregate: AggregateId) -> ExplorerResult<bool> {
        self.check_aggregate(aggregate)?;
        Ok(self.aggregates[aggregate.0].prepared)
    }

    /// Backing types, primary first
    pub fn backing_types(&self, aggregate: AggregateId) -> ExplorerResult<Vec<TypeRef>> {
        self.check_aggregate(aggregate)?;
        Ok(self.aggregates[aggregate.0]
            .backing_types
            .iter()
            .map(|single| self.single_types[single.0].type_ref.clone())
            .collect())
    }

    pub fn has_base_types(&self, aggregate: AggregateId) -> ExplorerResult<bool> {
        self.check_aggregate(aggregate)?;
        Ok(self.aggregates[aggregate.0].backing_types.len() > 1)
    }

    /// Field that produced this aggregate; `None` for the root
    pub fn parent_field(&self, aggregate: AggregateId) -> ExplorerResult<Option<FieldId>> {
        self.check_aggregate(aggregate)?;
        Ok(self.aggregates[aggregate.0].parent_field)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    pub fn field(&self, field: FieldId) -> ExplorerResult<FieldView> {
        self.check_field(field)?;
        let node = &self.fields[field.0];
        let child = match node.child_type {
            ChildType::Present(aggregate) => Some(aggregate),
            _ => None,
        };
        Ok(FieldView {
            id: field,
            name: node.name.clone(),
            result_type_name: node.result_type_name.clone(),
            source: node.source,
            declaring_type: self.single_types[node.parent_type.0].type_ref.clone(),
            is_enabled: node.is_enabled,
            child,
            persisted_id: self.persisted_record(field).map(|record| record.unique_id),
        })
    }

    /// Enable or disable a field; a no-op when nothing changes
    pub fn set_is_enabled(&mut self, field: FieldId, enabled: bool) -> ExplorerResult<()> {
        self.check_field(field)?;
        self.set_enabled(field, enabled);
        Ok(())
    }

    pub(crate) fn set_enabled(&mut self, field: FieldId, enabled: bool) {
        if self.fields[field.0].is_enabled == enabled {
            return;
        }
        self.fields[field.0].is_enabled = enabled;

        let path = self.path_of(field);
        let joined = path.join("/");
        let (kind, event) = if enabled {
            (FieldChangeKind::Enabled, Event::FieldEnabled)
        } else {
            (FieldChangeKind::Disabled, Event::FieldDisabled)
        };
        log_event_with_fields(event, &[("path", joined.as_str())]);

        let change = FieldChange {
            field,
            path,
            label: self.render_label(field),
            source: self.fields[field.0].source,
            kind,
            computation: self.persisted_record(field).map(|record| record.computation),
        };
        for listener in &self.field_listeners {
            listener(&change);
        }
    }

    /// Child aggregate of a field, created on first request
    ///
    /// Result types without fields (or that fail to resolve) have no child.
    pub async fn child_type(&mut self, field: FieldId) -> ExplorerResult<Option<AggregateId>> {
        self.check_field(field)?;
        match self.fields[field.0].child_type {
            ChildType::Present(aggregate) => return Ok(Some(aggregate)),
            ChildType::Absent => return Ok(None),
            ChildType::Unresolved => {}
        }
        let Some(result_type_name) = self.fields[field.0].result_type_name.clone() else {
            return Ok(None);
        };

        let module = self.single_types[self.fields[field.0].parent_type.0]
            .type_ref
            .module
            .clone();
        let type_ref = TypeRef::new(module, result_type_name);
        match self.inspector.provider().is_type_with_fields(&type_ref).await {
            Ok(true) => {
                let display = type_ref.to_string();
                let aggregate = self.new_aggregate(type_ref, Some(field));
                self.fields[field.0].child_type = ChildType::Present(aggregate);
                log_event_with_fields(Event::ChildTypeCreated, &[("type", display.as_str())]);
                Ok(Some(aggregate))
            }
            _ => {
                self.fields[field.0].child_type = ChildType::Absent;
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Disable every field under the root and drop all registry listeners
    pub fn dispose(&mut self) -> bool {
        self.disable_aggregate_completely(self.root)
    }

    pub(crate) fn disable_field_completely(&mut self, field: FieldId) -> bool {
        let mut had_enabled = self.fields[field.0].is_enabled;
        self.set_enabled(field, false);
        if let ChildType::Present(child) = self.fields[field.0].child_type {
            had_enabled = self.disable_aggregate_completely(child) || had_enabled;
        }
        had_enabled
    }

    pub(crate) fn disable_aggregate_completely(&mut self, aggregate: AggregateId) -> bool {
        let backing = std::mem::take(&mut self.aggregates[aggregate.0].backing_types);
        let mut had_enabled = false;
        for single in backing {
            had_enabled = self.disable_single_completely(single) || had_enabled;
        }
        had_enabled
    }

    fn disable_single_completely(&mut self, single: SingleTypeId) -> bool {
        self.unsubscribe(single);
        let node = &mut self.single_types[single.0];
        let fields: Vec<FieldId> = node
            .fields
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
            .into_iter()
            .chain(std::mem::take(&mut node.extended_fields))
            .chain(std::mem::take(&mut node.descriptions))
            .collect();

        let mut had_enabled = false;
        for field in fields {
            had_enabled = self.disable_field_completely(field) || had_enabled;
        }
        had_enabled
    }

    fn unsubscribe(&mut self, single: SingleTypeId) {
        if let Some((fields_listener, descriptions_listener)) = self.single_types[single.0].listeners.take() {
            self.inspector.remove_extended_fields_listener(fields_listener);
            self.inspector.remove_descriptions_listener(descriptions_listener);
        }
    }

    // =========================================================================
    // Registry changes
    // =========================================================================

    /// Apply queued registry changes; true when the tree changed
    pub fn sync(&mut self) -> bool {
        let mut changed = false;
        while let Ok(update) = self.updates_rx.try_recv() {
            changed = self.apply_update(update) || changed;
        }
        changed
    }

    fn apply_update(&mut self, update: RegistryUpdate) -> bool {
        match update {
            RegistryUpdate::ExtendedField(single, change) => {
                if self.single_types[single.0].listeners.is_none() {
                    return false;
                }
                match change.operation {
                    ExtensionOperation::Add => {
                        self.add_extended_field_node(single, &change.name, &change.extension.result_type_name);
                    }
                    ExtensionOperation::Remove => {
                        self.remove_matching(single, FieldSource::ExtendedFields, &change.name);
                    }
                    ExtensionOperation::Rename(new_name) => {
                        self.rename_matching(single, FieldSource::ExtendedFields, &change.name, &new_name);
                    }
                    ExtensionOperation::TypeChange(result_type_name) => {
                        self.retype_matching(single, &change.name, &result_type_name);
                    }
                }
                true
            }
            RegistryUpdate::Description(single, change) => {
                if self.single_types[single.0].listeners.is_none() {
                    return false;
                }
                match change.operation {
                    ExtensionOperation::Add => {
                        if !change.extension.is_primary {
                            self.add_description_node(single, &change.name, change.extension.renderer);
                        }
                    }
                    ExtensionOperation::Remove => {
                        self.remove_matching(single, FieldSource::Descriptions, &change.name);
                    }
                    ExtensionOperation::Rename(new_name) => {
                        self.rename_matching(single, FieldSource::Descriptions, &change.name, &new_name);
                    }
                    ExtensionOperation::TypeChange(_) => {}
                }
                true
            }
        }
    }

    fn matching(&self, single: SingleTypeId, source: FieldSource, name: &str) -> Vec<FieldId> {
        self.single_types[single.0]
            .collection(source)
            .iter()
            .copied()
            .filter(|field| self.fields[field.0].name == name)
            .collect()
    }

    fn remove_matching(&mut self, single: SingleTypeId, source: FieldSource, name: &str) {
        let removed = self.matching(single, source, name);
        for field in &removed {
            self.disable_field_completely(*field);
        }
        let node = &mut self.single_types[single.0];
        let list = match source {
            FieldSource::ExtendedFields => &mut node.extended_fields,
            FieldSource::Descriptions => &mut node.descriptions,
            FieldSource::Fields => return,
        };
        list.retain(|field| !removed.contains(field));
    }

    /// Renaming keeps the node, re-announcing it under its new path
    fn rename_matching(&mut self, single: SingleTypeId, source: FieldSource, name: &str, new_name: &str) {
        for field in self.matching(single, source, name) {
            let was_enabled = self.fields[field.0].is_enabled;
            self.set_enabled(field, false);
            self.fields[field.0].name = new_name.to_string();
            self.set_enabled(field, was_enabled);
        }
    }

    fn retype_matching(&mut self, single: SingleTypeId, name: &str, result_type_name: &str) {
        for field in self.matching(single, FieldSource::ExtendedFields, name) {
            if let ChildType::Present(child) = self.fields[field.0].child_type {
                self.disable_aggregate_completely(child);
            }
            let node = &mut self.fields[field.0];
            node.child_type = ChildType::Unresolved;
            node.result_type_name = Some(result_type_name.to_string());
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    pub(crate) fn aggregate_of(&self, field: FieldId) -> AggregateId {
        self.single_types[self.fields[field.0].parent_type.0].aggregate
    }

    pub(crate) fn check_aggregate(&self, aggregate: AggregateId) -> ExplorerResult<()> {
        if aggregate.0 < self.aggregates.len() {
            Ok(())
        } else {
            Err(ExplorerError::UnknownNode(format!("{:?}", aggregate)))
        }
    }

    pub(crate) fn check_field(&self, field: FieldId) -> ExplorerResult<()> {
        if field.0 < self.fields.len() {
            Ok(())
        } else {
            Err(ExplorerError::UnknownNode(format!("{:?}", field)))
        }
    }
}

impl Drop for TypeExplorer {
    fn drop(&mut self) {
        for single in 0..self.single_types.len() {
            self.unsubscribe(SingleTypeId(single));
        }
    }
}

impl std::fmt::Debug for TypeExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeExplorer")
            .field("root", &self.root)
            .field("aggregates", &self.aggregates.len())
            .field("single_types", &self.single_types.len())
            .field("fields", &self.fields.len())
            .finish()
    }
}
