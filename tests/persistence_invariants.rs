//! Persistence Invariant Tests
//!
//! User-defined fields created through the explorer are registered for
//! every consumer, written to the store, and come back after a restart.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::{json, Value};
use tempfile::TempDir;

use typelens::explorer::{ExplorerError, FieldChangeKind, FieldEntry, FieldRendering, FieldSource, TypeExplorer};
use typelens::persist::{
    ComputationCompiler, EditableComputation, JsonFileStore, KeyValueStore, MemoryStore,
    PersistError, PersistResult, PersistedFieldCollection, StoreFuture,
};
use typelens::resolve::{Description, DescriptionRenderer, FieldGetter, Inspector, ResolveResult};
use typelens::types::{DbgObject, StaticTypeSystem, TypeDef, TypeRef};
use typelens::LensConfig;

const MODULE: &str = "app";

/// Understands `as <Type>` getters and `text <literal>` renderers
struct TestCompiler;

fn getter<F>(f: F) -> F
where
    F: for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<DbgObject>>,
{
    f
}

fn renderer<F>(f: F) -> F
where
    F: for<'a> Fn(&'a Inspector, DbgObject) -> LocalBoxFuture<'a, ResolveResult<Description>>,
{
    f
}

impl ComputationCompiler for TestCompiler {
    fn compile_getter(&self, computation: &EditableComputation) -> PersistResult<FieldGetter> {
        let type_name = computation
            .source
            .strip_prefix("as ")
            .ok_or_else(|| PersistError::Compile(computation.source.clone()))?
            .to_string();
        Ok(Rc::new(getter(move |_, obj| {
            let type_name = type_name.clone();
            async move { Ok(obj.as_type(type_name)) }.boxed_local()
        })))
    }

    fn compile_renderer(&self, computation: &EditableComputation) -> PersistResult<DescriptionRenderer> {
        let text = computation
            .source
            .strip_prefix("text ")
            .ok_or_else(|| PersistError::Compile(computation.source.clone()))?
            .to_string();
        Ok(Rc::new(renderer(move |_, _| {
            let text = text.clone();
            async move { Ok(Description::Text(text)) }.boxed_local()
        })))
    }
}

/// One debugger session: its own registry and explorer over a shared store
struct Session {
    inspector: Rc<Inspector>,
    collection: Rc<PersistedFieldCollection>,
    explorer: TypeExplorer,
}

fn session(store: Rc<dyn KeyValueStore>) -> Session {
    let ts = StaticTypeSystem::new();
    ts.define(TypeDef::new(MODULE, "Base").field("id", "int", 0).size(8));
    ts.define(TypeDef::new(MODULE, "Node").base("Base").field("value", "int", 8).size(16));
    let inspector = Rc::new(Inspector::new(Rc::new(ts)));
    let collection = Rc::new(PersistedFieldCollection::new(store));
    let explorer = TypeExplorer::new(
        Rc::clone(&inspector),
        TypeRef::new(MODULE, "Node"),
        LensConfig::default(),
    )
    .with_persistence(Rc::clone(&collection), Rc::new(TestCompiler));
    Session {
        inspector,
        collection,
        explorer,
    }
}

/// Refuses every write, like a full disk
#[derive(Debug)]
struct FullDiskStore;

impl KeyValueStore for FullDiskStore {
    fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<Value>> {
        async move { Ok(None) }.boxed_local()
    }

    fn set<'a>(&'a self, _key: &'a str, _value: Value) -> StoreFuture<'a, ()> {
        async move { Err(PersistError::Store("disk full".into())) }.boxed_local()
    }

    fn delete<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
        async move { Ok(()) }.boxed_local()
    }

    fn all(&self) -> StoreFuture<'_, BTreeMap<String, Value>> {
        async move { Ok(BTreeMap::new()) }.boxed_local()
    }
}

fn file_store(dir: &TempDir) -> Rc<JsonFileStore> {
    Rc::new(JsonFileStore::new(dir.path(), "type-explorer"))
}

async fn expanded_entries(explorer: &mut TypeExplorer) -> Vec<FieldEntry> {
    let root = explorer.root();
    explorer.prepare_for_rendering(root).await.unwrap();
    if !explorer.is_expanded(root).unwrap() {
        explorer.toggle_expansion(root).unwrap();
    }
    let list = explorer.field_list(root).await.unwrap();
    list.extended.into_iter().chain(list.fields).collect()
}

async fn find_entry(explorer: &mut TypeExplorer, name: &str) -> Option<FieldEntry> {
    expanded_entries(explorer)
        .await
        .into_iter()
        .find(|e| e.display_name == name)
}

// =============================================================================
// EXTEND
// =============================================================================

/// A new user field is registered, stored, and enabled where it was created.
#[tokio::test]
async fn test_extend_registers_stores_and_enables() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let mut s = session(store.clone());

    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    s.explorer.on_field_change(move |change| {
        sink.borrow_mut()
            .push((change.kind, change.path.join("/"), change.computation.clone()));
    });

    let root = s.explorer.root();
    let field = s
        .explorer
        .extend(root, "parent", Some("Node"), EditableComputation::new("as Node"))
        .await
        .unwrap();

    assert_eq!(
        *changes.borrow(),
        vec![(
            FieldChangeKind::Enabled,
            "Node/extendedFields/parent".to_string(),
            Some(EditableComputation::new("as Node")),
        )]
    );

    let resolved = s
        .inspector
        .f(&DbgObject::new(MODULE, "Node", 0x100), "parent")
        .await
        .unwrap();
    assert_eq!(resolved.type_name(), "Node");

    let stored = store.get(&field.unique_id).await.unwrap().unwrap();
    assert_eq!(stored["name"], json!("parent"));
    assert_eq!(stored["resultTypeName"], json!("Node"));
    assert!(store.path().exists());

    let entry = find_entry(&mut s.explorer, "parent").await.unwrap();
    assert!(entry.is_enabled);
    assert_eq!(
        s.explorer.field(entry.field).unwrap().persisted_id,
        Some(field.unique_id)
    );
}

#[tokio::test]
async fn test_extend_description() {
    let mut s = session(Rc::new(MemoryStore::new()));
    let root = s.explorer.root();
    s.explorer
        .extend(root, "summary", None, EditableComputation::new("text hello"))
        .await
        .unwrap();

    let entry = find_entry(&mut s.explorer, "summary").await.unwrap();
    assert_eq!(entry.source, FieldSource::Descriptions);
    assert!(entry.is_enabled);
    assert_eq!(
        s.explorer
            .render_field(entry.field, &DbgObject::new(MODULE, "Node", 0x100))
            .await
            .unwrap(),
        FieldRendering::Rendered {
            label: "summary".into(),
            description: Description::text("hello"),
        }
    );
    // named descriptions never replace the primary one
    assert_eq!(
        s.inspector
            .desc(&DbgObject::new(MODULE, "Node", 0x100))
            .await
            .unwrap(),
        Some(Description::text("Node 0x100"))
    );
}

/// A computation that does not compile leaves no trace.
#[tokio::test]
async fn test_extend_compile_failure() {
    let store = Rc::new(MemoryStore::new());
    let mut s = session(store.clone());
    let root = s.explorer.root();

    let err = s
        .explorer
        .extend(root, "broken", Some("Node"), EditableComputation::new("garbage"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExplorerError::Persist(PersistError::Compile(_))));
    assert!(store.all().await.unwrap().is_empty());
    assert!(s.inspector.get_extended_fields(MODULE, "Node").is_empty());
    assert!(s.collection.fields().is_empty());
}

/// A field the store refused is neither registered nor enabled later.
#[tokio::test]
async fn test_extend_store_failure_leaves_no_trace() {
    let mut s = session(Rc::new(FullDiskStore));
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    s.explorer
        .on_field_change(move |change| sink.borrow_mut().push(change.path.join("/")));

    let root = s.explorer.root();
    let err = s
        .explorer
        .extend(root, "parent", Some("Node"), EditableComputation::new("as Node"))
        .await
        .unwrap_err();
    assert_eq!(err, ExplorerError::Persist(PersistError::Store("disk full".into())));
    assert!(s.inspector.get_extended_fields(MODULE, "Node").is_empty());
    assert!(s.collection.fields().is_empty());
    assert!(find_entry(&mut s.explorer, "parent").await.is_none());

    // a later registration under the same name is not auto-enabled
    s.inspector
        .add_extended_field(MODULE, "Node", "parent", "Node", |_, obj| {
            async move { Ok(obj.as_type("Node")) }.boxed_local()
        })
        .unwrap();
    let entry = find_entry(&mut s.explorer, "parent").await.unwrap();
    assert!(!entry.is_enabled);
    assert!(changes.borrow().is_empty());
}

/// A user field may not take a name already registered on its type.
#[tokio::test]
async fn test_extend_onto_existing_name_is_rejected() {
    let store = Rc::new(MemoryStore::new());
    let mut s = session(store.clone());
    let root = s.explorer.root();
    s.explorer
        .extend(root, "parent", Some("Node"), EditableComputation::new("as Node"))
        .await
        .unwrap();

    let err = s
        .explorer
        .extend(root, "parent", Some("Base"), EditableComputation::new("as Base"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ExplorerError::NameTaken {
            type_name: "Node".into(),
            name: "parent".into(),
        }
    );
    assert_eq!(store.all().await.unwrap().len(), 1);
    assert_eq!(s.collection.fields().len(), 1);

    // descriptions live in their own namespace
    s.explorer
        .extend(root, "parent", None, EditableComputation::new("text p"))
        .await
        .unwrap();
    assert_eq!(store.all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_extend_requires_persistence() {
    let ts = StaticTypeSystem::new();
    ts.define(TypeDef::new(MODULE, "Node").field("value", "int", 0));
    let inspector = Rc::new(Inspector::new(Rc::new(ts)));
    let mut explorer = TypeExplorer::new(inspector, TypeRef::new(MODULE, "Node"), LensConfig::default());
    let root = explorer.root();

    let err = explorer
        .extend(root, "x", Some("Node"), EditableComputation::new("as Node"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ExplorerError::PersistenceDisabled.code());
}

// =============================================================================
// RESTART
// =============================================================================

/// Fields come back in a new session over the same store.
#[tokio::test]
async fn test_fields_survive_restart() {
    let dir = TempDir::new().unwrap();
    let created = {
        let mut first = session(file_store(&dir));
        let root = first.explorer.root();
        first
            .explorer
            .extend(root, "parent", Some("Node"), EditableComputation::new("as Node"))
            .await
            .unwrap()
    };

    let mut second = session(file_store(&dir));
    assert!(!second.collection.is_loaded());
    let entry = find_entry(&mut second.explorer, "parent").await.unwrap();
    assert!(second.collection.is_loaded());
    assert!(!entry.is_enabled);
    assert_eq!(second.collection.get(&created.unique_id).unwrap().name, "parent");
    assert_eq!(
        second.explorer.field(entry.field).unwrap().persisted_id,
        Some(created.unique_id)
    );
}

/// Records that fail to decode or compile are skipped, not fatal.
#[tokio::test]
async fn test_load_skips_bad_records() {
    let store = Rc::new(MemoryStore::new());
    store.set("UserField-bad", json!({"module": MODULE})).await.unwrap();
    store
        .set(
            "UserField-uncompilable",
            json!({
                "module": MODULE,
                "typeName": "Node",
                "name": "nope",
                "resultTypeName": "Node",
                "computation": {"source": "garbage"}
            }),
        )
        .await
        .unwrap();
    store
        .set(
            "UserField-good",
            json!({
                "module": MODULE,
                "typeName": "Node",
                "name": "good",
                "resultTypeName": "Node",
                "computation": {"source": "as Node"}
            }),
        )
        .await
        .unwrap();

    let s = session(store);
    let loaded = s.collection.load(&s.inspector, &TestCompiler).await.unwrap();
    assert_eq!(loaded, 1);
    assert_eq!(s.collection.fields().len(), 1);
    assert_eq!(s.inspector.get_extended_fields(MODULE, "Node")[0].name, "good");

    // loading is once per collection
    assert_eq!(s.collection.load(&s.inspector, &TestCompiler).await.unwrap(), 1);
    assert_eq!(s.inspector.get_extended_fields(MODULE, "Node").len(), 1);
}

// =============================================================================
// EDIT AND DELETE
// =============================================================================

#[tokio::test]
async fn test_update_user_field() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let mut s = session(store.clone());
    let root = s.explorer.root();
    let created = s
        .explorer
        .extend(root, "parent", Some("Node"), EditableComputation::new("as Node"))
        .await
        .unwrap();
    let entry = find_entry(&mut s.explorer, "parent").await.unwrap();

    s.explorer
        .update_user_field(entry.field, "owner", Some("Base"))
        .await
        .unwrap();

    let view = s.explorer.field(entry.field).unwrap();
    assert_eq!(view.name, "owner");
    assert_eq!(view.result_type_name.as_deref(), Some("Base"));
    assert!(view.is_enabled);

    let resolved = s
        .inspector
        .f(&DbgObject::new(MODULE, "Node", 0x100), "owner")
        .await
        .unwrap();
    assert_eq!(resolved.type_name(), "Node");

    let stored = store.get(&created.unique_id).await.unwrap().unwrap();
    assert_eq!(stored["name"], json!("owner"));
    assert_eq!(stored["resultTypeName"], json!("Base"));
}

/// Renaming onto another field's name is refused; store and registry keep both.
#[tokio::test]
async fn test_rename_onto_existing_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let mut s = session(store.clone());
    let root = s.explorer.root();
    for (name, result_type) in [("a", "Node"), ("b", "Base")] {
        s.explorer
            .extend(
                root,
                name,
                Some(result_type),
                EditableComputation::new(format!("as {}", result_type)),
            )
            .await
            .unwrap();
    }
    let a = find_entry(&mut s.explorer, "a").await.unwrap();

    let err = s
        .explorer
        .update_user_field(a.field, "b", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TYPELENS_NAME_TAKEN");

    let mut stored: Vec<String> = store
        .all()
        .await
        .unwrap()
        .values()
        .filter_map(|record| record["name"].as_str().map(str::to_string))
        .collect();
    stored.sort();
    assert_eq!(stored, vec!["a", "b"]);
    assert_eq!(s.explorer.field(a.field).unwrap().name, "a");
    let resolved = s
        .inspector
        .f(&DbgObject::new(MODULE, "Node", 0x100), "b")
        .await
        .unwrap();
    assert_eq!(resolved.type_name(), "Base");

    let mut second = session(file_store(&dir));
    let entries = expanded_entries(&mut second.explorer).await;
    assert_eq!(entries.iter().filter(|e| e.display_name == "b").count(), 1);
    assert!(entries.iter().any(|e| e.display_name == "a"));
}

#[tokio::test]
async fn test_delete_user_field() {
    let store = Rc::new(MemoryStore::new());
    let mut s = session(store.clone());
    let root = s.explorer.root();
    s.explorer
        .extend(root, "parent", Some("Node"), EditableComputation::new("as Node"))
        .await
        .unwrap();
    let entry = find_entry(&mut s.explorer, "parent").await.unwrap();

    s.explorer.delete_user_field(entry.field).await.unwrap();

    assert!(find_entry(&mut s.explorer, "parent").await.is_none());
    assert!(!s.explorer.field(entry.field).unwrap().is_enabled);
    assert!(store.all().await.unwrap().is_empty());
    let err = s
        .inspector
        .f(&DbgObject::new(MODULE, "Node", 0x100), "parent")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TYPELENS_UNKNOWN_FIELD");
}

/// Native and code-registered fields cannot be edited as user fields.
#[tokio::test]
async fn test_only_user_fields_are_editable() {
    let mut s = session(Rc::new(MemoryStore::new()));
    s.inspector
        .add_extended_field(MODULE, "Node", "builtin", "Node", |_, obj| {
            async move { Ok(obj.as_type("Node")) }.boxed_local()
        })
        .unwrap();

    let native = find_entry(&mut s.explorer, "value").await.unwrap();
    let builtin = find_entry(&mut s.explorer, "builtin").await.unwrap();
    assert_eq!(s.explorer.field(builtin.field).unwrap().persisted_id, None);

    for field in [native.field, builtin.field] {
        let err = s.explorer.delete_user_field(field).await.unwrap_err();
        assert!(matches!(err, ExplorerError::NotUserDefined(_)));
    }
    let err = s
        .explorer
        .update_user_field(builtin.field, "renamed", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExplorerError::NotUserDefined(_)));
}
