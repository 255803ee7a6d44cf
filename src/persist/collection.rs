//! # Persisted Field Collection
//!
//! Every user-defined field known to the process. The store is read once;
//! each record is compiled and registered as it loads. Records that fail to
//! decode, compile, or register are skipped with a warning.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::OnceCell;

use crate::observability::{log_event_with_fields, Event};
use crate::resolve::{ExtendedField, Inspector, TypeDescription};

use super::errors::{PersistError, PersistResult};
use super::field::{ComputationCompiler, PersistedField};
use super::store::KeyValueStore;

/// User-defined fields backed by a key-value store
#[derive(Debug)]
pub struct PersistedFieldCollection {
    store: Rc<dyn KeyValueStore>,
    fields: RefCell<Vec<PersistedField>>,
    loaded: OnceCell<usize>,
}

impl PersistedFieldCollection {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            fields: RefCell::new(Vec::new()),
            loaded: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Read, compile, and register every stored field
    ///
    /// Runs once per collection; later and concurrent callers share the
    /// first load. Returns the number of fields registered.
    pub async fn load(&self, inspector: &Inspector, compiler: &dyn ComputationCompiler) -> PersistResult<usize> {
        self.loaded
            .get_or_try_init(|| self.load_from_store(inspector, compiler))
            .await
            .copied()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    async fn load_from_store(&self, inspector: &Inspector, compiler: &dyn ComputationCompiler) -> PersistResult<usize> {
        let stored = self.store.all().await?;
        let mut loaded = 0;

        for (id, value) in stored {
            let registered = PersistedField::from_stored(&id, value)
                .and_then(|field| register(&field, inspector, compiler).map(|()| field));
            match registered {
                Ok(field) => {
                    self.fields.borrow_mut().push(field);
                    loaded += 1;
                }
                Err(err) => {
                    let reason = err.to_string();
                    log_event_with_fields(
                        Event::PersistedFieldSkipped,
                        &[("id", id.as_str()), ("error", reason.as_str())],
                    );
                }
            }
        }

        let count = loaded.to_string();
        log_event_with_fields(Event::PersistedFieldsLoaded, &[("count", count.as_str())]);
        Ok(loaded)
    }

    /// Compile and register a field with the inspector
    pub fn register(
        &self,
        field: &PersistedField,
        inspector: &Inspector,
        compiler: &dyn ComputationCompiler,
    ) -> PersistResult<()> {
        register(field, inspector, compiler)
    }

    /// Store a new field and start tracking it
    pub async fn add(&self, field: PersistedField) -> PersistResult<()> {
        self.save(&field).await?;
        self.fields.borrow_mut().push(field);
        Ok(())
    }

    /// Rename or retype a tracked field; writes only when something changed
    pub async fn update(&self, unique_id: &str, name: &str, result_type_name: Option<&str>) -> PersistResult<bool> {
        let updated = {
            let mut fields = self.fields.borrow_mut();
            let field = fields
                .iter_mut()
                .find(|f| f.unique_id == unique_id)
                .ok_or_else(|| PersistError::NotFound(unique_id.to_string()))?;
            let result_type_name = result_type_name.map(str::to_string);
            if field.name == name && field.result_type_name == result_type_name {
                None
            } else {
                field.name = name.to_string();
                field.result_type_name = result_type_name;
                Some(field.clone())
            }
        };

        match updated {
            Some(field) => {
                self.save(&field).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop tracking a field and delete it from the store
    pub async fn remove(&self, unique_id: &str) -> PersistResult<PersistedField> {
        let removed = {
            let mut fields = self.fields.borrow_mut();
            let index = fields
                .iter()
                .position(|f| f.unique_id == unique_id)
                .ok_or_else(|| PersistError::NotFound(unique_id.to_string()))?;
            fields.remove(index)
        };
        self.store.delete(unique_id).await?;
        log_event_with_fields(Event::PersistedFieldDeleted, &[("id", unique_id)]);
        Ok(removed)
    }

    pub fn get(&self, unique_id: &str) -> Option<PersistedField> {
        self.fields
            .borrow()
            .iter()
            .find(|f| f.unique_id == unique_id)
            .cloned()
    }

    /// Tracked field registered as `name` on exactly `module!type_name`
    pub fn find(&self, module: &str, type_name: &str, name: &str) -> Option<PersistedField> {
        self.fields
            .borrow()
            .iter()
            .find(|f| f.module == module && f.type_name == type_name && f.name == name)
            .cloned()
    }

    pub fn fields(&self) -> Vec<PersistedField> {
        self.fields.borrow().clone()
    }

    async fn save(&self, field: &PersistedField) -> PersistResult<()> {
        self.store.set(&field.unique_id, field.to_stored()?).await?;
        log_event_with_fields(
            Event::PersistedFieldSaved,
            &[("id", field.unique_id.as_str()), ("name", field.name.as_str())],
        );
        Ok(())
    }
}

fn register(field: &PersistedField, inspector: &Inspector, compiler: &dyn ComputationCompiler) -> PersistResult<()> {
    let module = field.module.as_str();
    let type_name = field.type_name.as_str();
    let result = match &field.result_type_name {
        Some(result_type_name) => {
            let getter = compiler.compile_getter(&field.computation)?;
            inspector.register_extended_field(
                module,
                type_name,
                ExtendedField::from_getter(field.name.clone(), result_type_name.clone(), getter),
            )
        }
        None => {
            let renderer = compiler.compile_renderer(&field.computation)?;
            inspector.add_type_description(
                module,
                type_name,
                TypeDescription::from_renderer(field.name.clone(), false, renderer),
            )
        }
    };
    result.map_err(|e| PersistError::Registration(e.to_string()))
}
