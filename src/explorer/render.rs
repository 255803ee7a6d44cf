//! # Field Lists and Field Rendering

use std::collections::HashSet;
use std::rc::Rc;

use crate::types::DbgObject;

use super::controller::TypeExplorer;
use super::errors::ExplorerResult;
use super::fuzzy::fuzzy_match;
use super::node::{
    AggregateId, ChildType, FieldEntry, FieldId, FieldKind, FieldList, FieldRendering, FieldSource,
    SingleTypeId,
};

impl TypeExplorer {
    /// Fields to render for an aggregate, in display order
    ///
    /// Collapsed types show only enabled fields and fields with an enabled
    /// descendant. Base-type fields come first, farthest ancestor first.
    pub async fn field_list(&mut self, aggregate: AggregateId) -> ExplorerResult<FieldList> {
        self.check_aggregate(aggregate)?;
        self.ensure_persisted_loaded().await?;
        self.sync();
        self.prepare_for_rendering(aggregate).await?;

        let backing = self.aggregates[aggregate.0].backing_types.clone();
        for single in &backing {
            self.load_fields(*single).await?;
        }

        let natives = self.collect_to_render(&backing, FieldSource::Fields);
        let mut extended = self.collect_to_render(&backing, FieldSource::ExtendedFields);
        extended.extend(self.collect_to_render(&backing, FieldSource::Descriptions));

        let native_collisions = self.name_collisions(&natives, aggregate);
        let extended_collisions = self.name_collisions(&extended, aggregate);

        Ok(FieldList {
            extended: extended
                .iter()
                .map(|field| self.entry(*field, aggregate, &extended_collisions))
                .collect(),
            fields: natives
                .iter()
                .map(|field| self.entry(*field, aggregate, &native_collisions))
                .collect(),
        })
    }

    /// True when the aggregate's search query hides `field`
    pub fn is_filtered(&self, aggregate: AggregateId, field: FieldId) -> ExplorerResult<bool> {
        self.check_aggregate(aggregate)?;
        self.check_field(field)?;
        Ok(self.filtered(aggregate, field))
    }

    pub(crate) fn filtered(&self, aggregate: AggregateId, field: FieldId) -> bool {
        let node = &self.fields[field.0];
        let mut text = node.name.clone();
        if let Some(result_type_name) = &node.result_type_name {
            text.push(' ');
            text.push_str(result_type_name);
        }
        !fuzzy_match(&text, &self.aggregates[aggregate.0].search_query)
    }

    /// Per backing type, adjusted for collapsing, farthest base type first
    fn collect_to_render(&self, backing: &[SingleTypeId], source: FieldSource) -> Vec<FieldId> {
        backing
            .iter()
            .rev()
            .flat_map(|single| self.adjust_for_collapsing(*single, source))
            .collect()
    }

    fn adjust_for_collapsing(&self, single: SingleTypeId, source: FieldSource) -> Vec<FieldId> {
        let node = &self.single_types[single.0];
        let all = node.collection(source);
        if node.is_expanded {
            return all.to_vec();
        }
        let mut shown = Vec::new();
        for field in all {
            self.consider_when_collapsed(*field, &mut shown);
        }
        shown
    }

    /// Enabled fields surface even when buried under collapsed child types
    fn consider_when_collapsed(&self, field: FieldId, shown: &mut Vec<FieldId>) {
        let node = &self.fields[field.0];
        if node.is_enabled {
            shown.push(field);
        }
        if let ChildType::Present(child) = node.child_type {
            for single in &self.aggregates[child.0].backing_types {
                for nested in self.single_types[single.0].all_fields() {
                    self.consider_when_collapsed(nested, shown);
                }
            }
        }
    }

    /// Names declared more than once among the aggregate's own fields
    fn name_collisions(&self, fields: &[FieldId], aggregate: AggregateId) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut collisions = HashSet::new();
        for field in fields {
            if self.aggregate_of(*field) != aggregate {
                continue;
            }
            let name = &self.fields[field.0].name;
            if !seen.insert(name.clone()) {
                collisions.insert(name.clone());
            }
        }
        collisions
    }

    fn entry(&self, field: FieldId, rendering: AggregateId, collisions: &HashSet<String>) -> FieldEntry {
        let node = &self.fields[field.0];

        let mut names = vec![node.name.clone()];
        let mut current = field;
        while self.aggregate_of(current) != rendering {
            match self.aggregates[self.aggregate_of(current).0].parent_field {
                Some(parent) => {
                    current = parent;
                    names.push(self.fields[parent.0].name.clone());
                }
                None => break,
            }
        }
        let outermost = &self.fields[current.0];
        if collisions.contains(&outermost.name) {
            let declaring = &self.single_types[outermost.parent_type.0].type_ref.name;
            if let Some(last) = names.last_mut() {
                *last = format!("{}::{}", declaring, last);
            }
        }
        names.reverse();

        FieldEntry {
            field,
            display_name: names.join("."),
            type_name: node.result_type_name.clone(),
            source: node.source,
            is_enabled: node.is_enabled,
            is_filtered: self.aggregate_of(field) == rendering && self.filtered(rendering, field),
            show_type: self.all_types_expanded(node.parent_type),
        }
    }

    /// Every type from `single` up to the root is expanded and unfiltered
    fn all_types_expanded(&self, single: SingleTypeId) -> bool {
        let mut current = Some(single);
        while let Some(single) = current {
            let node = &self.single_types[single.0];
            let parent_field = self.aggregates[node.aggregate.0].parent_field;
            let filtered = parent_field
                .map_or(false, |parent| self.filtered(self.aggregate_of(parent), parent));
            if !node.is_expanded || filtered {
                return false;
            }
            current = parent_field.map(|parent| self.fields[parent.0].parent_type);
        }
        true
    }

    /// Fields from the root aggregate down to `field`
    fn chain_to(&self, field: FieldId) -> Vec<FieldId> {
        let mut chain = vec![field];
        let mut current = field;
        while let Some(parent) = self.aggregates[self.aggregate_of(current).0].parent_field {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Dotted field names from the root, as `render_field` labels them
    pub(crate) fn render_label(&self, field: FieldId) -> String {
        self.chain_to(field)
            .iter()
            .map(|id| self.fields[id.0].name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Run the getter chain from the root down to `field` and render the result
    ///
    /// Failures are reported in the rendering, never as an error.
    pub async fn render_field(&self, field: FieldId, object: &DbgObject) -> ExplorerResult<FieldRendering> {
        self.check_field(field)?;

        let steps: Vec<(String, FieldKind)> = self
            .chain_to(field)
            .iter()
            .map(|id| {
                let node = &self.fields[id.0];
                (node.name.clone(), node.kind.clone())
            })
            .collect();
        let label = self.render_label(field);

        let inspector = Rc::clone(&self.inspector);
        let mut value = object.clone();
        for (name, kind) in &steps {
            if value.is_pointer() && !matches!(kind, FieldKind::Description(_)) {
                value = match inspector.provider().dereference(&value).await {
                    Ok(pointee) => pointee,
                    Err(err) => {
                        return Ok(FieldRendering::Failed {
                            label,
                            message: err.to_string(),
                        })
                    }
                };
                if value.is_null() {
                    return Ok(FieldRendering::Nothing);
                }
            }
            let next = match kind {
                FieldKind::Native => inspector.field(&value, name).await,
                FieldKind::Extended => inspector.f(&value, name).await,
                FieldKind::Description(_) => Ok(value.clone()),
            };
            value = match next {
                Ok(next) => next,
                Err(err) => {
                    return Ok(FieldRendering::Failed {
                        label,
                        message: err.to_string(),
                    })
                }
            };
        }

        if value.is_null() {
            return Ok(FieldRendering::Nothing);
        }

        let rendered = match steps.last().map(|(_, kind)| kind) {
            Some(FieldKind::Description(renderer)) => renderer(&*inspector, value).await.map(Some),
            _ => inspector.desc(&value).await,
        };
        Ok(match rendered {
            Ok(Some(description)) => FieldRendering::Rendered { label, description },
            Ok(None) => FieldRendering::Nothing,
            Err(err) => FieldRendering::Failed {
                label,
                message: err.to_string(),
            },
        })
    }
}
