//! # Extended Fields
//!
//! Fields defined by code rather than type information, reached with
//! dotted paths through `Inspector::f`.

use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::observability::{log_event_with_fields, Event};
use crate::registry::ExtensionPayload;
use crate::types::{DbgObject, TypeRef};

use super::errors::{ResolveError, ResolveResult};
use super::inspector::Inspector;
use super::search::search_including_base_types;

/// Computation behind an extended field
pub type FieldGetter =
    Rc<dyn for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<DbgObject>>>;

/// An extended field registration
#[derive(Clone)]
pub struct ExtendedField {
    pub field_name: String,
    pub result_type_name: String,
    pub getter: FieldGetter,
}

impl ExtendedField {
    pub fn new<F>(field_name: impl Into<String>, result_type_name: impl Into<String>, getter: F) -> Self
    where
        F: for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<DbgObject>>
            + 'static,
    {
        Self::from_getter(field_name, result_type_name, Rc::new(getter))
    }

    pub fn from_getter(
        field_name: impl Into<String>,
        result_type_name: impl Into<String>,
        getter: FieldGetter,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            result_type_name: result_type_name.into(),
            getter,
        }
    }
}

impl ExtensionPayload for ExtendedField {
    fn renamed(&mut self, new_name: &str) {
        self.field_name = new_name.to_string();
    }

    fn retyped(&mut self, result_type_name: &str) {
        self.result_type_name = result_type_name.to_string();
    }
}

impl fmt::Debug for ExtendedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedField")
            .field("field_name", &self.field_name)
            .field("result_type_name", &self.result_type_name)
            .finish()
    }
}

impl Inspector {
    /// Follow a dotted path of extended fields, one segment at a time
    pub async fn f(&self, object: &DbgObject, path: &str) -> ResolveResult<DbgObject> {
        let mut current = object.clone();
        for segment in path.split('.') {
            current = self.extended_field_value(&current, segment).await?;
        }
        Ok(current)
    }

    /// Extended field registered on `ty` or its nearest ancestor
    pub async fn find_extended_field(
        &self,
        ty: &TypeRef,
        field_name: &str,
    ) -> ResolveResult<Option<ExtendedField>> {
        let found = search_including_base_types(self.base_type_cache(), ty, |t| {
            self.extended_fields()
                .get_extension(&t.module, &t.name, field_name)
        })
        .await?;
        Ok(found)
    }

    async fn extended_field_value(&self, object: &DbgObject, field_name: &str) -> ResolveResult<DbgObject> {
        let field = self
            .find_extended_field(&object.type_ref(), field_name)
            .await?
            .ok_or_else(|| ResolveError::UnknownField {
                module: object.module().to_string(),
                type_name: object.type_name().to_string(),
                field: field_name.to_string(),
            })?;

        let result = (field.getter)(self, object.clone()).await?;
        self.ensure_compatible(&field, result).await
    }

    async fn ensure_compatible(&self, field: &ExtendedField, result: DbgObject) -> ResolveResult<DbgObject> {
        if result.type_name() == field.result_type_name {
            return Ok(result);
        }

        let bases = self.base_types(&result.type_ref()).await?;
        if bases.iter().any(|base| base.name == field.result_type_name) {
            return Ok(result);
        }

        log_event_with_fields(
            Event::TypeMismatch,
            &[
                ("field", field.field_name.as_str()),
                ("expected", field.result_type_name.as_str()),
                ("actual", result.type_name()),
            ],
        );
        Err(ResolveError::TypeMismatch {
            field: field.field_name.clone(),
            expected: field.result_type_name.clone(),
            actual: result.type_name().to_string(),
        })
    }
}
