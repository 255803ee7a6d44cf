//! # Type-Extension Registry
//!
//! Maps `(module, type)` to named extension records. Keys are exact type
//! names or predicates over type names; predicates are scanned in
//! registration order. Listeners subscribe to one `(module, type name)` and
//! hear about every later change whose key applies to that type name.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::observability::{log_event_with_fields, Event};
use crate::types::TypeRef;

use super::errors::{RegistryError, RegistryResult};
use super::key::{TypeKey, TypePredicate};

/// Payload hooks for in-place edits
pub trait ExtensionPayload: Clone {
    /// Called after the extension is renamed
    fn renamed(&mut self, _new_name: &str) {}

    /// Called after the extension's result type changes
    fn retyped(&mut self, _result_type_name: &str) {}
}

/// Kind of registry change delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionOperation {
    Add,
    Remove,
    /// Carries the new name
    Rename(String),
    /// Carries the new result type name
    TypeChange(String),
}

impl ExtensionOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionOperation::Add => "add",
            ExtensionOperation::Remove => "remove",
            ExtensionOperation::Rename(_) => "rename",
            ExtensionOperation::TypeChange(_) => "typechange",
        }
    }
}

/// A change notification
///
/// `type_name` is the type the listener subscribed to, which differs from
/// the registration key for predicate registrations.
#[derive(Debug, Clone)]
pub struct ExtensionChange<T> {
    pub module: String,
    pub type_name: String,
    /// Name of the extension before the change
    pub name: String,
    /// Payload after the change
    pub extension: T,
    pub operation: ExtensionOperation,
}

/// One registration as returned by listings
#[derive(Debug, Clone)]
pub struct RegisteredExtension<T> {
    pub module: String,
    pub key: TypeKey,
    pub name: String,
    pub extension: T,
}

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerCallback<T> = Rc<dyn Fn(&ExtensionChange<T>)>;

#[derive(Clone)]
struct Named<T> {
    name: String,
    extension: T,
}

struct PredicateGroup<T> {
    module: String,
    predicate: TypePredicate,
    extensions: Vec<Named<T>>,
}

struct Listener<T> {
    id: ListenerId,
    module: String,
    type_name: String,
    callback: ListenerCallback<T>,
}

struct RegistryState<T> {
    exact: HashMap<TypeRef, Vec<Named<T>>>,
    exact_order: Vec<TypeRef>,
    predicates: Vec<PredicateGroup<T>>,
    listeners: Vec<Listener<T>>,
}

impl<T> Default for RegistryState<T> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            exact_order: Vec::new(),
            predicates: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

impl<T> RegistryState<T> {
    fn group(&self, module: &str, key: &TypeKey) -> Option<&Vec<Named<T>>> {
        match key {
            TypeKey::Exact(name) => self.exact.get(&TypeRef::new(module, name.clone())),
            TypeKey::Predicate(predicate) => self
                .predicates
                .iter()
                .find(|g| g.module == module && g.predicate.same_as(predicate))
                .map(|g| &g.extensions),
        }
    }

    fn group_mut(&mut self, module: &str, key: &TypeKey) -> Option<&mut Vec<Named<T>>> {
        match key {
            TypeKey::Exact(name) => self.exact.get_mut(&TypeRef::new(module, name.clone())),
            TypeKey::Predicate(predicate) => self
                .predicates
                .iter_mut()
                .find(|g| g.module == module && g.predicate.same_as(predicate))
                .map(|g| &mut g.extensions),
        }
    }

    fn group_or_insert(&mut self, module: &str, key: &TypeKey) -> &mut Vec<Named<T>> {
        match key {
            TypeKey::Exact(name) => {
                let type_ref = TypeRef::new(module, name.clone());
                if !self.exact.contains_key(&type_ref) {
                    self.exact_order.push(type_ref.clone());
                }
                self.exact.entry(type_ref).or_default()
            }
            TypeKey::Predicate(predicate) => {
                let position = self
                    .predicates
                    .iter()
                    .position(|g| g.module == module && g.predicate.same_as(predicate));
                let index = match position {
                    Some(index) => index,
                    None => {
                        self.predicates.push(PredicateGroup {
                            module: module.to_string(),
                            predicate: predicate.clone(),
                            extensions: Vec::new(),
                        });
                        self.predicates.len() - 1
                    }
                };
                &mut self.predicates[index].extensions
            }
        }
    }

    fn listeners_for(&self, module: &str, key: &TypeKey) -> Vec<(String, ListenerCallback<T>)> {
        self.listeners
            .iter()
            .filter(|l| l.module == module && key.applies_to(&l.type_name))
            .map(|l| (l.type_name.clone(), Rc::clone(&l.callback)))
            .collect()
    }
}

/// Registry of named extensions keyed by type
pub struct TypeExtension<T> {
    state: RefCell<RegistryState<T>>,
    next_listener: Cell<u64>,
}

impl<T> Default for TypeExtension<T> {
    fn default() -> Self {
        Self {
            state: RefCell::new(RegistryState::default()),
            next_listener: Cell::new(1),
        }
    }
}

impl<T: ExtensionPayload> TypeExtension<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extension` as `name` on `key`
    ///
    /// A registration with the same module, key, and name replaces the old
    /// one; listeners hear a `remove` for the old payload, then an `add`.
    pub fn add_extension(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        name: &str,
        extension: T,
    ) -> RegistryResult<()> {
        validate_name(name)?;
        let key = key.into();

        let replaced = {
            let mut state = self.state.borrow_mut();
            let group = state.group_or_insert(module, &key);
            match group.iter_mut().find(|n| n.name == name) {
                Some(existing) => Some(std::mem::replace(&mut existing.extension, extension.clone())),
                None => {
                    group.push(Named {
                        name: name.to_string(),
                        extension: extension.clone(),
                    });
                    None
                }
            }
        };

        if let Some(old) = replaced {
            self.notify(module, &key, name, old, ExtensionOperation::Remove);
        }
        log_registration(Event::ExtensionAdded, module, &key, name);
        self.notify(module, &key, name, extension, ExtensionOperation::Add);
        Ok(())
    }

    /// Remove a registration; returns false (and notifies nobody) if absent
    pub fn remove_extension(&self, module: &str, key: impl Into<TypeKey>, name: &str) -> bool {
        let key = key.into();
        let removed = {
            let mut state = self.state.borrow_mut();
            state.group_mut(module, &key).and_then(|group| {
                let index = group.iter().position(|n| n.name == name)?;
                Some(group.remove(index).extension)
            })
        };

        match removed {
            Some(extension) => {
                log_registration(Event::ExtensionRemoved, module, &key, name);
                self.notify(module, &key, name, extension, ExtensionOperation::Remove);
                true
            }
            None => false,
        }
    }

    /// Rename a registration in place
    ///
    /// An existing registration already called `new_name` under the same key
    /// is removed first.
    pub fn rename_extension(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        old_name: &str,
        new_name: &str,
    ) -> RegistryResult<bool> {
        validate_name(new_name)?;
        let key = key.into();
        if old_name == new_name {
            return Ok(self.state.borrow().group(module, &key).map_or(false, |g| {
                g.iter().any(|n| n.name == old_name)
            }));
        }
        let exists = self
            .state
            .borrow()
            .group(module, &key)
            .map_or(false, |g| g.iter().any(|n| n.name == old_name));
        if !exists {
            return Ok(false);
        }
        self.remove_extension(module, key.clone(), new_name);

        let renamed = {
            let mut state = self.state.borrow_mut();
            state.group_mut(module, &key).and_then(|group| {
                let entry = group.iter_mut().find(|n| n.name == old_name)?;
                entry.name = new_name.to_string();
                entry.extension.renamed(new_name);
                Some(entry.extension.clone())
            })
        };

        match renamed {
            Some(extension) => {
                log_event_with_fields(
                    Event::ExtensionRenamed,
                    &[("module", module), ("from", old_name), ("to", new_name)],
                );
                self.notify(
                    module,
                    &key,
                    old_name,
                    extension,
                    ExtensionOperation::Rename(new_name.to_string()),
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Change the result type of a registration in place
    pub fn change_result_type(
        &self,
        module: &str,
        key: impl Into<TypeKey>,
        name: &str,
        result_type_name: &str,
    ) -> bool {
        let key = key.into();
        let changed = {
            let mut state = self.state.borrow_mut();
            state.group_mut(module, &key).and_then(|group| {
                let entry = group.iter_mut().find(|n| n.name == name)?;
                entry.extension.retyped(result_type_name);
                Some(entry.extension.clone())
            })
        };

        match changed {
            Some(extension) => {
                log_event_with_fields(
                    Event::ExtensionRetyped,
                    &[("module", module), ("name", name), ("type", result_type_name)],
                );
                self.notify(
                    module,
                    &key,
                    name,
                    extension,
                    ExtensionOperation::TypeChange(result_type_name.to_string()),
                );
                true
            }
            None => false,
        }
    }

    /// First extension at exactly this type accepted by `accept`
    ///
    /// Exact-name registrations are searched before predicate registrations.
    pub fn find_extension(
        &self,
        module: &str,
        type_name: &str,
        accept: impl Fn(&str, &T) -> bool,
    ) -> Option<(String, T)> {
        let state = self.state.borrow();
        let exact = state
            .exact
            .get(&TypeRef::new(module, type_name))
            .and_then(|group| group.iter().find(|n| accept(&n.name, &n.extension)));
        if let Some(hit) = exact {
            return Some((hit.name.clone(), hit.extension.clone()));
        }

        state
            .predicates
            .iter()
            .filter(|g| g.module == module && g.predicate.matches(type_name))
            .find_map(|g| g.extensions.iter().find(|n| accept(&n.name, &n.extension)))
            .map(|hit| (hit.name.clone(), hit.extension.clone()))
    }

    /// Whether `name` is registered under exactly this key
    pub fn has_extension(&self, module: &str, key: impl Into<TypeKey>, name: &str) -> bool {
        let key = key.into();
        self.state
            .borrow()
            .group(module, &key)
            .map_or(false, |g| g.iter().any(|n| n.name == name))
    }

    /// Extension called `name` at exactly this type
    pub fn get_extension(&self, module: &str, type_name: &str, name: &str) -> Option<T> {
        self.find_extension(module, type_name, |n, _| n == name)
            .map(|(_, extension)| extension)
    }

    /// Every extension that applies to this type, for display
    ///
    /// Predicate matches come first, then exact-name registrations, each in
    /// registration order. Lookups check exact names first; this listing
    /// intentionally does not.
    pub fn get_all_extensions(&self, module: &str, type_name: &str) -> Vec<RegisteredExtension<T>> {
        let state = self.state.borrow();
        let mut result = Vec::new();

        for group in state
            .predicates
            .iter()
            .filter(|g| g.module == module && g.predicate.matches(type_name))
        {
            for named in &group.extensions {
                result.push(RegisteredExtension {
                    module: module.to_string(),
                    key: TypeKey::Predicate(group.predicate.clone()),
                    name: named.name.clone(),
                    extension: named.extension.clone(),
                });
            }
        }

        if let Some(group) = state.exact.get(&TypeRef::new(module, type_name)) {
            for named in group {
                result.push(RegisteredExtension {
                    module: module.to_string(),
                    key: TypeKey::Exact(type_name.to_string()),
                    name: named.name.clone(),
                    extension: named.extension.clone(),
                });
            }
        }

        result
    }

    /// Every key that currently holds at least one registration
    pub fn all_types(&self) -> Vec<(String, TypeKey)> {
        let state = self.state.borrow();
        let mut result: Vec<(String, TypeKey)> = state
            .exact_order
            .iter()
            .filter(|t| state.exact.get(*t).map_or(false, |g| !g.is_empty()))
            .map(|t| (t.module.clone(), TypeKey::Exact(t.name.clone())))
            .collect();
        result.extend(
            state
                .predicates
                .iter()
                .filter(|g| !g.extensions.is_empty())
                .map(|g| (g.module.clone(), TypeKey::Predicate(g.predicate.clone()))),
        );
        result
    }

    /// Subscribe to changes that apply to `(module, type_name)`
    pub fn add_listener(
        &self,
        module: &str,
        type_name: &str,
        callback: impl Fn(&ExtensionChange<T>) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.state.borrow_mut().listeners.push(Listener {
            id,
            module: module.to_string(),
            type_name: type_name.to_string(),
            callback: Rc::new(callback),
        });
        id
    }

    /// Unsubscribe; returns false if the listener was already gone
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|l| l.id != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    fn notify(&self, module: &str, key: &TypeKey, name: &str, extension: T, operation: ExtensionOperation) {
        // Callbacks run after the borrow is released so they may re-enter.
        let listeners = self.state.borrow().listeners_for(module, key);
        for (type_name, callback) in listeners {
            let change = ExtensionChange {
                module: module.to_string(),
                type_name,
                name: name.to_string(),
                extension: extension.clone(),
                operation: operation.clone(),
            };
            callback(&change);
        }
    }
}

impl<T> fmt::Debug for TypeExtension<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TypeExtension")
            .field("exact", &state.exact.len())
            .field("predicates", &state.predicates.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

fn log_registration(event: Event, module: &str, key: &TypeKey, name: &str) {
    let key = key.to_string();
    log_event_with_fields(event, &[("module", module), ("key", key.as_str()), ("name", name)]);
}

fn validate_name(name: &str) -> RegistryResult<()> {
    if name.contains('.') {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
