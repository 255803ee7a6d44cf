//! # In-Memory Type System
//!
//! A declarative `TypeProvider` backed by tables: type layouts, enum
//! constants, and scalar memory cells. Used by embedders without a live
//! debuggee and throughout the test suites.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use futures_util::future::FutureExt;

use super::errors::{IntrospectionError, IntrospectionResult};
use super::object::{DbgObject, FieldDescriptor, ScalarValue, TypeRef};
use super::provider::{IntrospectionFuture, TypeProvider};

const POINTER_SIZE: u64 = 8;

/// Declared layout of one type
#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub module: String,
    pub name: String,
    pub bases: Vec<String>,
    pub fields: Vec<FieldDescriptor>,
    pub enum_constants: Vec<(i128, String)>,
    pub size: u64,
}

impl TypeDef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a direct base type (declaration order is nearest-first)
    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.bases.push(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, type_name: impl Into<String>, offset: u64) -> Self {
        self.fields.push(FieldDescriptor::new(name, type_name, offset));
        self
    }

    pub fn constant(mut self, value: i128, name: impl Into<String>) -> Self {
        self.enum_constants.push((value, name.into()));
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// Table-driven type provider
#[derive(Debug, Default)]
pub struct StaticTypeSystem {
    types: RefCell<HashMap<TypeRef, TypeDef>>,
    memory: RefCell<HashMap<u64, ScalarValue>>,
    base_type_requests: Cell<usize>,
    base_type_yields: Cell<usize>,
    unavailable: Cell<bool>,
}

impl StaticTypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or replace) a type
    pub fn define(&self, def: TypeDef) {
        let key = TypeRef::new(def.module.clone(), def.name.clone());
        self.types.borrow_mut().insert(key, def);
    }

    /// Store a scalar (or pointer value) at an address
    pub fn write(&self, address: u64, value: ScalarValue) {
        self.memory.borrow_mut().insert(address, value);
    }

    /// Store a pointer value at an address
    pub fn write_pointer(&self, address: u64, target: u64) {
        self.write(address, ScalarValue::Unsigned(target as u128));
    }

    /// Make every base-type request fail until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Suspend each base-type request `yields` times before it answers
    pub fn set_base_type_yields(&self, yields: usize) {
        self.base_type_yields.set(yields);
    }

    /// Number of base-type requests the provider has served
    pub fn base_type_requests(&self) -> usize {
        self.base_type_requests.get()
    }

    fn lookup(&self, ty: &TypeRef) -> Option<TypeDef> {
        self.types.borrow().get(ty).cloned()
    }

    fn read(&self, address: u64) -> IntrospectionResult<ScalarValue> {
        self.memory
            .borrow()
            .get(&address)
            .copied()
            .ok_or(IntrospectionError::MemoryUnreadable(address))
    }

    fn collect_bases(&self, ty: &TypeRef, out: &mut Vec<TypeRef>) {
        let Some(def) = self.lookup(ty) else {
            return;
        };
        for base in &def.bases {
            let base_ref = TypeRef::new(ty.module.clone(), base.clone());
            if out.contains(&base_ref) {
                continue;
            }
            out.push(base_ref.clone());
            self.collect_bases(&base_ref, out);
        }
    }

    fn size_of(&self, module: &str, type_name: &str) -> u64 {
        let probe = DbgObject::new(module, type_name, 0);
        if probe.is_pointer() {
            return POINTER_SIZE;
        }
        if let (Some(length), Some(element)) = (probe.array_length(), probe.element_type_name()) {
            return length as u64 * self.size_of(module, &element);
        }
        match type_name {
            "bool" | "char" | "signed char" | "unsigned char" | "int8_t" | "uint8_t" => 1,
            "short" | "unsigned short" | "wchar_t" | "int16_t" | "uint16_t" => 2,
            "int" | "unsigned int" | "long" | "unsigned long" | "int32_t" | "uint32_t" | "float" => 4,
            "long long" | "unsigned long long" | "__int64" | "unsigned __int64" | "int64_t"
            | "uint64_t" | "size_t" | "double" => 8,
            _ => self
                .lookup(&TypeRef::new(module, type_name))
                .map(|def| def.size)
                .unwrap_or(0),
        }
    }

    fn find_field(&self, ty: &TypeRef, name: &str) -> Option<FieldDescriptor> {
        let def = self.lookup(ty)?;
        if let Some(field) = def.fields.iter().find(|f| f.name == name) {
            return Some(field.clone());
        }
        let mut bases = Vec::new();
        self.collect_bases(ty, &mut bases);
        bases
            .iter()
            .filter_map(|base| self.lookup(base))
            .find_map(|def| def.fields.into_iter().find(|f| f.name == name))
    }
}

impl TypeProvider for StaticTypeSystem {
    fn base_types<'a>(&'a self, ty: &'a TypeRef) -> IntrospectionFuture<'a, Vec<TypeRef>> {
        async move {
            self.base_type_requests.set(self.base_type_requests.get() + 1);
            for _ in 0..self.base_type_yields.get() {
                tokio::task::yield_now().await;
            }
            if self.unavailable.get() {
                return Err(IntrospectionError::Unavailable("type system offline".into()));
            }
            let mut bases = Vec::new();
            self.collect_bases(ty, &mut bases);
            Ok(bases)
        }
        .boxed_local()
    }

    fn is_type_with_fields<'a>(&'a self, ty: &'a TypeRef) -> IntrospectionFuture<'a, bool> {
        async move {
            let def = self
                .lookup(ty)
                .ok_or_else(|| IntrospectionError::UnknownType(ty.to_string()))?;
            if !def.fields.is_empty() {
                return Ok(true);
            }
            let mut bases = Vec::new();
            self.collect_bases(ty, &mut bases);
            Ok(bases
                .iter()
                .filter_map(|base| self.lookup(base))
                .any(|def| !def.fields.is_empty()))
        }
        .boxed_local()
    }

    fn fields<'a>(
        &'a self,
        ty: &'a TypeRef,
        include_base_types: bool,
    ) -> IntrospectionFuture<'a, Vec<FieldDescriptor>> {
        async move {
            let Some(def) = self.lookup(ty) else {
                return Ok(Vec::new());
            };
            let mut fields = def.fields;
            if include_base_types {
                let mut bases = Vec::new();
                self.collect_bases(ty, &mut bases);
                for base in bases.iter().filter_map(|base| self.lookup(base)) {
                    fields.extend(base.fields);
                }
            }
            Ok(fields)
        }
        .boxed_local()
    }

    fn field<'a>(
        &'a self,
        object: &'a DbgObject,
        name: &'a str,
    ) -> IntrospectionFuture<'a, DbgObject> {
        async move {
            let field = self.find_field(&object.type_ref(), name).ok_or_else(|| {
                IntrospectionError::UnknownField {
                    type_name: object.type_name().to_string(),
                    field: name.to_string(),
                }
            })?;
            Ok(DbgObject::new(
                object.module(),
                field.type_name,
                object.address() + field.offset,
            ))
        }
        .boxed_local()
    }

    fn read_scalar<'a>(&'a self, object: &'a DbgObject) -> IntrospectionFuture<'a, ScalarValue> {
        async move { self.read(object.address()) }.boxed_local()
    }

    fn dereference<'a>(&'a self, object: &'a DbgObject) -> IntrospectionFuture<'a, DbgObject> {
        async move {
            let pointee = object
                .pointee_type_name()
                .ok_or_else(|| IntrospectionError::NotAPointer(object.type_name().to_string()))?;
            let target = match self.read(object.address())? {
                ScalarValue::Unsigned(v) => v as u64,
                ScalarValue::Signed(v) => v as u64,
                ScalarValue::Float(_) => {
                    return Err(IntrospectionError::MemoryUnreadable(object.address()))
                }
            };
            Ok(DbgObject::new(object.module(), pointee, target))
        }
        .boxed_local()
    }

    fn is_enum<'a>(&'a self, ty: &'a TypeRef) -> IntrospectionFuture<'a, bool> {
        async move {
            Ok(self
                .lookup(ty)
                .map(|def| !def.enum_constants.is_empty())
                .unwrap_or(false))
        }
        .boxed_local()
    }

    fn enum_constant<'a>(&'a self, object: &'a DbgObject) -> IntrospectionFuture<'a, String> {
        async move {
            let value = self.read(object.address())?;
            let raw = match value {
                ScalarValue::Signed(v) => v,
                ScalarValue::Unsigned(v) => v as i128,
                ScalarValue::Float(v) => v as i128,
            };
            self.lookup(&object.type_ref())
                .and_then(|def| {
                    def.enum_constants
                        .into_iter()
                        .find(|(constant, _)| *constant == raw)
                        .map(|(_, name)| name)
                })
                .ok_or_else(|| IntrospectionError::NoEnumConstant {
                    type_name: object.type_name().to_string(),
                    value: value.to_string(),
                })
        }
        .boxed_local()
    }

    fn array_element<'a>(
        &'a self,
        object: &'a DbgObject,
        index: usize,
    ) -> IntrospectionFuture<'a, DbgObject> {
        async move {
            let out_of_range = || IntrospectionError::IndexOutOfRange {
                type_name: object.type_name().to_string(),
                index,
            };
            let length = object.array_length().ok_or_else(out_of_range)?;
            if index >= length {
                return Err(out_of_range());
            }
            let element = object.element_type_name().ok_or_else(out_of_range)?;
            let stride = self.size_of(object.module(), &element);
            Ok(DbgObject::new(
                object.module(),
                element,
                object.address() + stride * index as u64,
            ))
        }
        .boxed_local()
    }
}
