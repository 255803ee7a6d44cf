//! # Field Paths
//!
//! A field is addressed from the root aggregate as
//! `[typeName, source, fieldName, typeName, source, fieldName, ...]`, one
//! triple per level. Paths are what `on_field_change` reports and what
//! `enable_path` replays.

use super::controller::TypeExplorer;
use super::errors::ExplorerResult;
use super::node::{FieldId, FieldSource};

impl TypeExplorer {
    pub fn compute_path(&self, field: FieldId) -> ExplorerResult<Vec<String>> {
        self.check_field(field)?;
        Ok(self.path_of(field))
    }

    pub(crate) fn path_of(&self, field: FieldId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(field);
        while let Some(field) = current {
            let node = &self.fields[field.0];
            let single = &self.single_types[node.parent_type.0];
            path.push(node.name.clone());
            path.push(node.source.as_str().to_string());
            path.push(single.type_ref.name.clone());
            current = self.aggregates[single.aggregate.0].parent_field;
        }
        path.reverse();
        path
    }

    /// Walk a path from the root, creating child types as needed, and
    /// enable the field at its end
    ///
    /// Returns false when some step of the path no longer exists.
    pub async fn enable_path(&mut self, path: &[String]) -> ExplorerResult<bool> {
        self.ensure_persisted_loaded().await?;
        self.sync();
        if path.is_empty() || path.len() % 3 != 0 {
            return Ok(false);
        }

        let mut aggregate = self.root();
        for (level, step) in path.chunks(3).enumerate() {
            let (type_name, source, field_name) = (&step[0], &step[1], &step[2]);

            self.prepare_for_rendering(aggregate).await?;
            let single = self.aggregates[aggregate.0]
                .backing_types
                .iter()
                .copied()
                .find(|single| self.single_types[single.0].type_ref.name == *type_name);
            let Some(single) = single else {
                return Ok(false);
            };

            let Ok(source) = source.parse::<FieldSource>() else {
                return Ok(false);
            };
            let candidates = match source {
                FieldSource::Fields => self.load_fields(single).await?,
                _ => self.single_types[single.0].collection(source).to_vec(),
            };
            let Some(field) = candidates
                .into_iter()
                .find(|field| self.fields[field.0].name == *field_name)
            else {
                return Ok(false);
            };

            if (level + 1) * 3 == path.len() {
                self.set_enabled(field, true);
                return Ok(true);
            }
            match self.child_type(field).await? {
                Some(child) => aggregate = child,
                None => return Ok(false),
            }
        }
        Ok(false)
    }
}
