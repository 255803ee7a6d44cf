//! # Objects and Type References
//!
//! A `DbgObject` is an opaque typed reference into debuggee memory. Everything
//! that requires reading memory or type information goes through a
//! `TypeProvider`; the queries here only look at the type name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Built-in scalar type names the default description policy reads directly
const SCALAR_TYPE_NAMES: &[&str] = &[
    "bool",
    "char",
    "signed char",
    "unsigned char",
    "wchar_t",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "unsigned long long",
    "__int64",
    "unsigned __int64",
    "int8_t",
    "uint8_t",
    "int16_t",
    "uint16_t",
    "int32_t",
    "uint32_t",
    "int64_t",
    "uint64_t",
    "size_t",
    "float",
    "double",
];

/// A type qualified by the module that defines it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    pub module: String,
    pub name: String,
}

impl TypeRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.module, self.name)
    }
}

/// A typed reference to an object in debuggee memory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbgObject {
    module: String,
    type_name: String,
    address: u64,
    bitcount: Option<u32>,
}

impl DbgObject {
    /// Create an object reference
    pub fn new(module: impl Into<String>, type_name: impl Into<String>, address: u64) -> Self {
        Self {
            module: module.into(),
            type_name: type_name.into(),
            address,
            bitcount: None,
        }
    }

    /// Mark the object as a bit field of the given width
    pub fn with_bitcount(mut self, bitcount: u32) -> Self {
        self.bitcount = Some(bitcount);
        self
    }

    /// Reinterpret the same address as another type
    pub fn as_type(&self, type_name: impl Into<String>) -> Self {
        Self::new(self.module.clone(), type_name, self.address)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn bitcount(&self) -> Option<u32> {
        self.bitcount
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.module.clone(), self.type_name.clone())
    }

    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// Address formatted as `0x`-prefixed hex
    pub fn ptr(&self) -> String {
        format!("0x{:x}", self.address)
    }

    pub fn is_pointer(&self) -> bool {
        self.type_name.trim_end().ends_with('*')
    }

    /// Type name with one level of indirection removed
    pub fn pointee_type_name(&self) -> Option<&str> {
        let trimmed = self.type_name.trim_end();
        trimmed.strip_suffix('*').map(str::trim_end)
    }

    pub fn is_scalar(&self) -> bool {
        SCALAR_TYPE_NAMES.contains(&self.type_name.as_str())
    }

    pub fn is_array(&self) -> bool {
        self.array_length().is_some()
    }

    /// Number of elements for `T[N]` types
    pub fn array_length(&self) -> Option<usize> {
        let (_, length, _) = split_array_type(&self.type_name)?;
        Some(length)
    }

    /// Element type for `T[N]` types; `T[N][M]` yields `T[M]`
    pub fn element_type_name(&self) -> Option<String> {
        let (element, _, rest) = split_array_type(&self.type_name)?;
        Some(format!("{}{}", element, rest))
    }
}

impl fmt::Display for DbgObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{} {}", self.module, self.type_name, self.ptr())
    }
}

fn split_array_type(type_name: &str) -> Option<(&str, usize, &str)> {
    let open = type_name.find('[')?;
    let close = open + type_name[open..].find(']')?;
    let length = type_name[open + 1..close].trim().parse().ok()?;
    Some((type_name[..open].trim_end(), length, &type_name[close + 1..]))
}

/// A field declared by a type's native layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_name: String,
    pub offset: u64,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, offset: u64) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            offset,
        }
    }

    /// Field type with trailing pointer markers removed
    pub fn dereferenced_type_name(&self) -> &str {
        self.type_name.trim_end_matches(|c: char| c == '*' || c.is_whitespace())
    }
}

/// A scalar read from memory at full width
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Signed(i128),
    Unsigned(u128),
    Float(f64),
}

impl ScalarValue {
    /// True when the value is exactly one, the encoding of `true`
    pub fn is_one(&self) -> bool {
        match *self {
            ScalarValue::Signed(v) => v == 1,
            ScalarValue::Unsigned(v) => v == 1,
            ScalarValue::Float(v) => v == 1.0,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Signed(v) => write!(f, "{}", v),
            ScalarValue::Unsigned(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
        }
    }
}
