//! # User-Defined Fields
//!
//! The explorer's "Extend", edit, and delete actions. Each one goes through
//! the registry (so every explorer sees it) and the persisted collection.

use crate::persist::{EditableComputation, PersistedField};
use crate::types::TypeRef;

use super::controller::{Persistence, TypeExplorer};
use super::errors::{ExplorerError, ExplorerResult};
use super::node::{AggregateId, FieldId, FieldSource};

impl TypeExplorer {
    fn persistence(&self) -> ExplorerResult<&Persistence> {
        self.persistence.as_ref().ok_or(ExplorerError::PersistenceDisabled)
    }

    /// Load persisted fields once; no-op without persistence
    pub(crate) async fn ensure_persisted_loaded(&mut self) -> ExplorerResult<()> {
        if let Some(persistence) = &self.persistence {
            persistence
                .collection
                .load(&self.inspector, persistence.compiler.as_ref())
                .await?;
        }
        self.sync();
        Ok(())
    }

    /// Create a user-defined field on the aggregate's primary type
    ///
    /// With a result type this is an extended field, otherwise a
    /// description. The new field is enabled in `aggregate` as soon as it
    /// appears there.
    pub async fn extend(
        &mut self,
        aggregate: AggregateId,
        name: &str,
        result_type_name: Option<&str>,
        computation: EditableComputation,
    ) -> ExplorerResult<PersistedField> {
        self.check_aggregate(aggregate)?;
        self.persistence()?;
        self.ensure_persisted_loaded().await?;

        let Some(&primary) = self.aggregates[aggregate.0].backing_types.first() else {
            return Err(ExplorerError::UnknownNode(format!("{:?}", aggregate)));
        };
        let type_ref = self.single_types[primary.0].type_ref.clone();
        let field = PersistedField::new(
            type_ref.module.clone(),
            type_ref.name.clone(),
            name,
            result_type_name.map(str::to_string),
            computation,
        );

        self.check_name_free(&field.module, &field.type_name, name, field.is_description())?;

        let pending = (aggregate, type_ref, name.to_string());
        self.pending_auto_enable.push(pending.clone());
        let registered = {
            let persistence = self.persistence()?;
            persistence
                .collection
                .register(&field, &self.inspector, persistence.compiler.as_ref())
        };
        if let Err(err) = registered {
            self.pending_auto_enable.retain(|p| *p != pending);
            return Err(err.into());
        }

        let collection = self.persistence()?.collection.clone();
        if let Err(err) = collection.add(field.clone()).await {
            self.pending_auto_enable.retain(|p| *p != pending);
            self.unregister(&field);
            self.sync();
            return Err(err.into());
        }
        self.sync();
        self.pending_auto_enable.retain(|p| *p != pending);
        Ok(field)
    }

    /// Rename (and for extended fields, retype) a user-defined field
    pub async fn update_user_field(
        &mut self,
        field: FieldId,
        name: &str,
        result_type_name: Option<&str>,
    ) -> ExplorerResult<()> {
        self.check_field(field)?;
        let record = self.user_record(field)?;
        let key = record.type_name.as_str();
        if name != record.name {
            self.check_name_free(&record.module, key, name, record.is_description())?;
        }

        let stored_result_type = match &record.result_type_name {
            Some(current) => {
                let result_type_name = result_type_name.unwrap_or(current);
                self.inspector.update_extended_field(
                    &record.module,
                    key,
                    &record.name,
                    name,
                    result_type_name,
                )?;
                Some(result_type_name)
            }
            None => {
                self.inspector
                    .rename_type_description(&record.module, key, &record.name, name)?;
                None
            }
        };

        let collection = self.persistence()?.collection.clone();
        collection
            .update(&record.unique_id, name, stored_result_type)
            .await?;
        self.sync();
        Ok(())
    }

    /// Unregister a user-defined field and delete it from the store
    pub async fn delete_user_field(&mut self, field: FieldId) -> ExplorerResult<()> {
        self.check_field(field)?;
        let record = self.user_record(field)?;
        self.unregister(&record);

        let collection = self.persistence()?.collection.clone();
        collection.remove(&record.unique_id).await?;
        self.sync();
        Ok(())
    }

    fn unregister(&self, record: &PersistedField) -> bool {
        let key = record.type_name.as_str();
        if record.is_description() {
            self.inspector
                .remove_type_description(&record.module, key, &record.name)
        } else {
            self.inspector
                .remove_extended_field(&record.module, key, &record.name)
        }
    }

    /// User fields never replace a registration with the same name
    fn check_name_free(&self, module: &str, type_name: &str, name: &str, is_description: bool) -> ExplorerResult<()> {
        let taken = if is_description {
            self.inspector.descriptions().has_extension(module, type_name, name)
        } else {
            self.inspector.extended_fields().has_extension(module, type_name, name)
        };
        if taken {
            return Err(ExplorerError::NameTaken {
                type_name: type_name.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn user_record(&self, field: FieldId) -> ExplorerResult<PersistedField> {
        self.persistence()?;
        self.persisted_record(field)
            .ok_or_else(|| ExplorerError::NotUserDefined(self.fields[field.0].name.clone()))
    }

    /// Persisted record behind a field, if it is user-defined
    pub(crate) fn persisted_record(&self, field: FieldId) -> Option<PersistedField> {
        let persistence = self.persistence.as_ref()?;
        let node = &self.fields[field.0];
        if node.source == FieldSource::Fields {
            return None;
        }
        let TypeRef { module, name } = &self.single_types[node.parent_type.0].type_ref;
        persistence
            .collection
            .find(module, name, &node.name)
            .filter(|record| record.is_description() == (node.source == FieldSource::Descriptions))
    }
}
