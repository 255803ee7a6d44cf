//! # Inspector
//!
//! Owns the two process-scoped registries (extended fields and type
//! descriptions) together with the provider and its base-type cache. The
//! registration API lives here; resolution lives in `fields` and
//! `descriptions`.

use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::registry::{
    ExtensionChange, ListenerId, RegisteredExtension, TypeExtension, TypeKey,
};
use crate::types::{BaseTypeCache, DbgObject, TypeProvider, TypeRef};

use super::descriptions::TypeDescription;
use super::errors::ResolveResult;
use super::fields::ExtendedField;

/// Resolution engine and registration API
pub struct Inspector {
    provider: Rc<dyn TypeProvider>,
    base_types: BaseTypeCache,
    extended_fields: TypeExtension<ExtendedField>,
    descriptions: TypeExtension<TypeDescription>,
}

impl Inspector {
    /// Create an inspector with empty registries
    pub fn new(provider: Rc<dyn TypeProvider>) -> Self {
        Self {
            base_types: BaseTypeCache::new(Rc::clone(&provider)),
            provider,
            extended_fields: TypeExtension::new(),
            descriptions: TypeExtension::new(),
        }
    }

    pub fn provider(&self) -> &dyn TypeProvider {
        self.provider.as_ref()
    }

    pub fn base_type_cache(&self) -> &BaseTypeCache {
        &self.base_types
    }

    pub fn extended_fields(&self) -> &TypeExtension<ExtendedField> {
        &self.extended_fields
    }

    pub fn descriptions(&self) -> &TypeExtension<TypeDescription> {
        &self.descriptions
    }

    /// Base types of `ty`, nearest first (memoized)
    pub async fn base_types(&self, ty: &TypeRef) -> ResolveResult<Vec<TypeRef>> {
        Ok(self.base_types.base_types(ty).await?)
    }

    /// Native field access through the provider
    pub async fn field(&self, object: &DbgObject, name: &str) -> ResolveResult<DbgObject> {
        Ok(self.provider.field(object, name).await?)
    }

    // =========================================================================
    // Extended fields
    // =========================================================================

    /// Register an extended field
    ///
    /// Fails when `field_name` contains a `.`.
    pub fn add_extended_field<F>(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        field_name: &str,
        result_type_name: &str,
        getter: F,
    ) -> ResolveResult<()>
    where
        F: for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<DbgObject>>
            + 'static,
    {
        self.register_extended_field(
            module,
            key,
            ExtendedField::new(field_name, result_type_name, getter),
        )
    }

    /// Register a prepared extended field under its own name
    pub fn register_extended_field(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        field: ExtendedField,
    ) -> ResolveResult<()> {
        let name = field.field_name.clone();
        self.extended_fields.add_extension(module, key, &name, field)?;
        Ok(())
    }

    /// Remove an extended field; absent fields are ignored
    pub fn remove_extended_field(&self, module: &str, key: impl Into<TypeKey>, field_name: &str) -> bool {
        self.extended_fields.remove_extension(module, key, field_name)
    }

    /// Rename and retype an extended field in place
    ///
    /// Listeners hear `rename` (when the name changes) and then `typechange`.
    pub fn update_extended_field(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        old_name: &str,
        new_name: &str,
        result_type_name: &str,
    ) -> ResolveResult<bool> {
        let key = key.into();
        if old_name != new_name
            && !self
                .extended_fields
                .rename_extension(module, key.clone(), old_name, new_name)?
        {
            return Ok(false);
        }
        Ok(self
            .extended_fields
            .change_result_type(module, key, new_name, result_type_name))
    }

    /// Extended fields that apply to exactly this type (no base types)
    pub fn get_extended_fields(&self, module: &str, type_name: &str) -> Vec<RegisteredExtension<ExtendedField>> {
        self.extended_fields.get_all_extensions(module, type_name)
    }

    pub fn on_extended_fields_changed(
        &self,
        module: &str,
        type_name: &str,
        callback: impl Fn(&ExtensionChange<ExtendedField>) + 'static,
    ) -> ListenerId {
        self.extended_fields.add_listener(module, type_name, callback)
    }

    pub fn remove_extended_fields_listener(&self, id: ListenerId) -> bool {
        self.extended_fields.remove_listener(id)
    }

    // =========================================================================
    // Descriptions
    // =========================================================================

    /// Register a description under its own name
    pub fn add_type_description(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        description: TypeDescription,
    ) -> ResolveResult<()> {
        let name = description.name.clone();
        self.descriptions.add_extension(module, key, &name, description)?;
        Ok(())
    }

    pub fn remove_type_description(&self, module: &str, key: impl Into<TypeKey>, name: &str) -> bool {
        self.descriptions.remove_extension(module, key, name)
    }

    pub fn rename_type_description(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        old_name: &str,
        new_name: &str,
    ) -> ResolveResult<bool> {
        Ok(self.descriptions.rename_extension(module, key, old_name, new_name)?)
    }

    pub fn get_descriptions(&self, module: &str, type_name: &str) -> Vec<RegisteredExtension<TypeDescription>> {
        self.descriptions.get_all_extensions(module, type_name)
    }

    pub fn on_descriptions_changed(
        &self,
        module: &str,
        type_name: &str,
        callback: impl Fn(&ExtensionChange<TypeDescription>) + 'static,
    ) -> ListenerId {
        self.descriptions.add_listener(module, type_name, callback)
    }

    pub fn remove_descriptions_listener(&self, id: ListenerId) -> bool {
        self.descriptions.remove_listener(id)
    }

    // =========================================================================
    // Catalogs
    // =========================================================================

    /// `module!Type.field (ResultType)` for every exact-name extended field
    pub fn extended_field_catalog(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (module, key) in self.extended_fields.all_types() {
            let Some(type_name) = key.exact_name() else {
                continue;
            };
            for registered in self.extended_fields.get_all_extensions(&module, type_name) {
                if registered.key.exact_name().is_none() {
                    continue;
                }
                lines.push(format!(
                    "{}!{}.{} ({})",
                    module, type_name, registered.name, registered.extension.result_type_name
                ));
            }
        }
        lines
    }

    /// `module!Type` for every type with a primary description
    pub fn description_catalog(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (module, key) in self.descriptions.all_types() {
            let Some(type_name) = key.exact_name() else {
                continue;
            };
            let has_primary = self
                .descriptions
                .get_all_extensions(&module, type_name)
                .iter()
                .any(|r| r.key.exact_name().is_some() && r.extension.is_primary);
            if has_primary {
                lines.push(format!("{}!{}", module, type_name));
            }
        }
        lines
    }
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("base_types", &self.base_types)
            .field("extended_fields", &self.extended_fields)
            .field("descriptions", &self.descriptions)
            .finish()
    }
}
