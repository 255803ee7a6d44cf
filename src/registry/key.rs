//! # Registration Keys
//!
//! Extensions attach to a type either by exact name or by a predicate over
//! type names.

use std::fmt;
use std::rc::Rc;

/// A predicate over type names, compared by identity
#[derive(Clone)]
pub struct TypePredicate {
    label: String,
    predicate: Rc<dyn Fn(&str) -> bool>,
}

impl TypePredicate {
    /// Create a predicate; `label` is shown when registrations are listed
    pub fn new(label: impl Into<String>, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self {
            label: label.into(),
            predicate: Rc::new(predicate),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, type_name: &str) -> bool {
        (self.predicate)(type_name)
    }

    /// True when both handles refer to the same registered predicate
    pub fn same_as(&self, other: &TypePredicate) -> bool {
        Rc::ptr_eq(&self.predicate, &other.predicate)
    }
}

impl fmt::Debug for TypePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypePredicate({})", self.label)
    }
}

/// What an extension is registered against
#[derive(Debug, Clone)]
pub enum TypeKey {
    /// Case-sensitive type name
    Exact(String),
    Predicate(TypePredicate),
}

impl TypeKey {
    /// True when this key applies to `type_name`
    pub fn applies_to(&self, type_name: &str) -> bool {
        match self {
            TypeKey::Exact(name) => name == type_name,
            TypeKey::Predicate(predicate) => predicate.matches(type_name),
        }
    }

    pub fn exact_name(&self) -> Option<&str> {
        match self {
            TypeKey::Exact(name) => Some(name),
            TypeKey::Predicate(_) => None,
        }
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::Exact(name.to_string())
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        TypeKey::Exact(name)
    }
}

impl From<TypePredicate> for TypeKey {
    fn from(predicate: TypePredicate) -> Self {
        TypeKey::Predicate(predicate)
    }
}

impl From<&TypePredicate> for TypeKey {
    fn from(predicate: &TypePredicate) -> Self {
        TypeKey::Predicate(predicate.clone())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Exact(name) => write!(f, "{}", name),
            TypeKey::Predicate(predicate) => write!(f, "({})", predicate.label()),
        }
    }
}
