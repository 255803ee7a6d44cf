//! # Type Descriptions
//!
//! `desc()` renders an object with the primary description registered for
//! its type (or nearest ancestor), falling back to a default policy for
//! booleans, scalars, pointers, enums, and everything else. A broken custom
//! description never fails the caller; it renders as `<type>???`.

use std::fmt;
use std::rc::Rc;

use futures_util::future::{join_all, LocalBoxFuture};

use crate::observability::{log_event_with_fields, Event};
use crate::registry::ExtensionPayload;
use crate::types::{DbgObject, TypeRef};

use super::description::Description;
use super::errors::ResolveResult;
use super::inspector::Inspector;
use super::search::search_including_base_types;

/// Name primary descriptions are registered under
pub const PRIMARY_DESCRIPTION_NAME: &str = "default";

/// Computation behind a description
pub type DescriptionRenderer =
    Rc<dyn for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<Description>>>;

/// A description registration
#[derive(Clone)]
pub struct TypeDescription {
    pub name: String,
    /// Primary descriptions back `desc()`; the rest are explorer-only
    pub is_primary: bool,
    pub renderer: DescriptionRenderer,
}

impl TypeDescription {
    /// The description `desc()` uses for matching types
    pub fn primary<F>(renderer: F) -> Self
    where
        F: for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<Description>>
            + 'static,
    {
        Self::from_renderer(PRIMARY_DESCRIPTION_NAME, true, Rc::new(renderer))
    }

    /// An additional named description, shown in the explorer only
    pub fn named<F>(name: impl Into<String>, renderer: F) -> Self
    where
        F: for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<Description>>
            + 'static,
    {
        Self::from_renderer(name, false, Rc::new(renderer))
    }

    pub fn from_renderer(name: impl Into<String>, is_primary: bool, renderer: DescriptionRenderer) -> Self {
        Self {
            name: name.into(),
            is_primary,
            renderer,
        }
    }
}

impl ExtensionPayload for TypeDescription {
    fn renamed(&mut self, new_name: &str) {
        self.name = new_name.to_string();
    }
}

impl fmt::Debug for TypeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescription")
            .field("name", &self.name)
            .field("is_primary", &self.is_primary)
            .finish()
    }
}

impl Inspector {
    /// Whether the object's type (or an ancestor) has a custom description
    pub async fn has_desc(&self, object: &DbgObject) -> ResolveResult<bool> {
        Ok(self.primary_description(&object.type_ref()).await?.is_some())
    }

    /// Human-readable description; `None` for null objects
    ///
    /// Only base-type discovery failures surface as errors.
    pub async fn desc(&self, object: &DbgObject) -> ResolveResult<Option<Description>> {
        if object.is_null() {
            return Ok(None);
        }

        let custom = self.primary_description(&object.type_ref()).await?;
        if object.is_array() {
            return Ok(Some(self.describe_array(object, custom.as_ref()).await));
        }
        Ok(self.describe_with(object, custom.as_ref()).await)
    }

    /// Primary description for `ty`, searching base types nearest-first
    pub async fn primary_description(&self, ty: &TypeRef) -> ResolveResult<Option<TypeDescription>> {
        let lookup = |t: &TypeRef| {
            self.descriptions()
                .find_extension(&t.module, &t.name, |_, d| d.is_primary)
                .map(|(_, description)| description)
        };
        if ty.name == "void" {
            return Ok(lookup(ty));
        }
        Ok(search_including_base_types(self.base_type_cache(), ty, lookup).await?)
    }

    async fn describe_array(&self, array: &DbgObject, custom: Option<&TypeDescription>) -> Description {
        let length = array.array_length().unwrap_or(0);
        let element_type = array.element_type_name().unwrap_or_default();

        let elements = join_all((0..length).map(|index| self.provider().array_element(array, index))).await;

        let element_type = element_type.as_str();
        let rendered = join_all(elements.into_iter().map(|element| async move {
            let element = match element {
                Ok(element) => element,
                Err(_) => return Description::Text(format!("{}???", element_type)),
            };
            let own = match custom {
                Some(description) => Some(description.clone()),
                None => match self.primary_description(&element.type_ref()).await {
                    Ok(found) => found,
                    Err(_) => return Description::Text(format!("{}???", element.type_name())),
                },
            };
            self.describe_with(&element, own.as_ref())
                .await
                .unwrap_or_else(|| Description::Text(String::new()))
        }))
        .await;

        Description::List(rendered)
    }

    /// Apply a custom description (or the default policy) with fallbacks
    async fn describe_with(&self, object: &DbgObject, custom: Option<&TypeDescription>) -> Option<Description> {
        match custom {
            Some(description) => match (description.renderer)(self, object.clone()).await {
                Ok(rendered) => Some(rendered),
                Err(err) => {
                    let reason = err.to_string();
                    log_event_with_fields(
                        Event::DescriptionFallback,
                        &[("type", object.type_name()), ("error", reason.as_str())],
                    );
                    if object.is_null() {
                        None
                    } else {
                        Some(Description::Text(format!("{}???", object.type_name())))
                    }
                }
            },
            None => match self.default_description(object).await {
                Ok(rendered) => Some(rendered),
                Err(_) if object.is_null() => None,
                Err(_) => Some(Description::Text(format!(
                    "{} {}",
                    object.type_name(),
                    object.ptr()
                ))),
            },
        }
    }

    async fn default_description(&self, object: &DbgObject) -> ResolveResult<Description> {
        let provider = self.provider();

        if object.type_name() == "bool" || object.bitcount() == Some(1) {
            let value = provider.read_scalar(object).await?;
            let text = if value.is_one() { "true" } else { "false" };
            return Ok(Description::text(text));
        }

        if object.is_scalar() {
            let value = provider.read_scalar(object).await?;
            return Ok(Description::Text(value.to_string()));
        }

        if object.is_pointer() {
            let pointee = provider.dereference(object).await?;
            let label = self.pointee_label(&pointee).await;
            return Ok(Description::Text(format!("{} {}", label, pointee.ptr())));
        }

        if provider.is_enum(&object.type_ref()).await.unwrap_or(false) {
            if let Ok(constant) = provider.enum_constant(object).await {
                return Ok(Description::Text(constant));
            }
        }

        Ok(Description::Text(format!("{} {}", object.type_name(), object.ptr())))
    }

    /// Custom description text of a pointee, or its type name
    async fn pointee_label(&self, pointee: &DbgObject) -> String {
        if pointee.is_null() {
            return pointee.type_name().to_string();
        }
        match self.primary_description(&pointee.type_ref()).await {
            Ok(Some(description)) => match (description.renderer)(self, pointee.clone()).await {
                Ok(rendered) => rendered.to_string(),
                Err(_) => format!("{}???", pointee.type_name()),
            },
            _ => pointee.type_name().to_string(),
        }
    }
}
