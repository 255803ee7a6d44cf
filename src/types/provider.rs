//! # Type-Introspection Provider
//!
//! The boundary to whatever reads type information and memory from the
//! debuggee. Every call may suspend and may fail.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};

use super::errors::IntrospectionResult;
use super::object::{DbgObject, FieldDescriptor, ScalarValue, TypeRef};

/// Future returned by provider calls
pub type IntrospectionFuture<'a, T> = LocalBoxFuture<'a, IntrospectionResult<T>>;

/// Source of type layouts and memory contents
pub trait TypeProvider {
    /// Base types of `ty`, nearest ancestor first
    fn base_types<'a>(&'a self, ty: &'a TypeRef) -> IntrospectionFuture<'a, Vec<TypeRef>>;

    /// Whether the type declares any fields (itself or through its bases)
    fn is_type_with_fields<'a>(&'a self, ty: &'a TypeRef) -> IntrospectionFuture<'a, bool>;

    /// Native fields of `ty`, optionally including inherited ones
    fn fields<'a>(
        &'a self,
        ty: &'a TypeRef,
        include_base_types: bool,
    ) -> IntrospectionFuture<'a, Vec<FieldDescriptor>>;

    /// Native field access, `object.name`
    fn field<'a>(&'a self, object: &'a DbgObject, name: &'a str)
        -> IntrospectionFuture<'a, DbgObject>;

    /// Full-width scalar value stored at the object
    fn read_scalar<'a>(&'a self, object: &'a DbgObject) -> IntrospectionFuture<'a, ScalarValue>;

    /// Follow a pointer object to its pointee
    fn dereference<'a>(&'a self, object: &'a DbgObject) -> IntrospectionFuture<'a, DbgObject>;

    fn is_enum<'a>(&'a self, ty: &'a TypeRef) -> IntrospectionFuture<'a, bool>;

    /// Symbolic name of an enum object's current value
    fn enum_constant<'a>(&'a self, object: &'a DbgObject) -> IntrospectionFuture<'a, String>;

    /// Element `index` of an array object
    fn array_element<'a>(
        &'a self,
        object: &'a DbgObject,
        index: usize,
    ) -> IntrospectionFuture<'a, DbgObject>;
}

type SharedBaseTypes = Shared<LocalBoxFuture<'static, IntrospectionResult<Vec<TypeRef>>>>;

/// Memoized base-type discovery
///
/// Concurrent callers asking for the same type await one shared request.
/// Failed requests are evicted so a later caller asks the provider again.
pub struct BaseTypeCache {
    provider: Rc<dyn TypeProvider>,
    entries: RefCell<HashMap<TypeRef, SharedBaseTypes>>,
}

impl BaseTypeCache {
    pub fn new(provider: Rc<dyn TypeProvider>) -> Self {
        Self {
            provider,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Rc<dyn TypeProvider> {
        &self.provider
    }

    /// Base types of `ty`, nearest first
    pub async fn base_types(&self, ty: &TypeRef) -> IntrospectionResult<Vec<TypeRef>> {
        let pending = {
            let mut entries = self.entries.borrow_mut();
            entries
                .entry(ty.clone())
                .or_insert_with(|| {
                    let provider = Rc::clone(&self.provider);
                    let ty = ty.clone();
                    async move { provider.base_types(&ty).await }
                        .boxed_local()
                        .shared()
                })
                .clone()
        };

        let result = pending.await;
        if result.is_err() {
            self.entries.borrow_mut().remove(ty);
        }
        result
    }

    /// Drop every memoized entry
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl std::fmt::Debug for BaseTypeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseTypeCache")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}
