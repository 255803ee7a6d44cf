//! Type Explorer Invariant Tests
//!
//! Aggregate preparation, expansion and base-type toggles, collapsed-field
//! surfacing, name collisions, field paths, registry synchronization, and
//! field rendering.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::FutureExt;

use typelens::explorer::{
    AggregateId, FieldChangeKind, FieldEntry, FieldRendering, FieldSource, TypeExplorer,
};
use typelens::resolve::{Description, Inspector, ResolveError, TypeDescription};
use typelens::types::{DbgObject, ScalarValue, StaticTypeSystem, TypeDef, TypeRef};
use typelens::LensConfig;

const MODULE: &str = "app";

fn setup() -> (Rc<StaticTypeSystem>, Rc<Inspector>) {
    let ts = Rc::new(StaticTypeSystem::new());
    ts.define(TypeDef::new(MODULE, "Base").field("id", "int", 0).size(8));
    ts.define(
        TypeDef::new(MODULE, "Node")
            .base("Base")
            .field("value", "int", 8)
            .field("next", "Node*", 16)
            .size(24),
    );
    ts.define(TypeDef::new(MODULE, "Shape").base("Base").size(8));
    ts.define(TypeDef::new(MODULE, "Shadow").base("Base").field("id", "int", 8).size(16));
    let inspector = Rc::new(Inspector::new(ts.clone()));
    (ts, inspector)
}

fn explorer(inspector: &Rc<Inspector>, root: &str) -> TypeExplorer {
    TypeExplorer::new(
        Rc::clone(inspector),
        TypeRef::new(MODULE, root),
        LensConfig::default(),
    )
}

type Log = Rc<RefCell<Vec<(FieldChangeKind, String)>>>;

fn record_changes(explorer: &mut TypeExplorer) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    explorer.on_field_change(move |change| {
        sink.borrow_mut().push((change.kind, change.path.join("/")));
    });
    log
}

async fn entry(explorer: &mut TypeExplorer, aggregate: AggregateId, display_name: &str) -> FieldEntry {
    let list = explorer.field_list(aggregate).await.unwrap();
    list.extended
        .into_iter()
        .chain(list.fields)
        .find(|e| e.display_name == display_name)
        .unwrap_or_else(|| panic!("no field {} in list", display_name))
}

async fn expanded_root(explorer: &mut TypeExplorer) -> AggregateId {
    let root = explorer.root();
    explorer.prepare_for_rendering(root).await.unwrap();
    explorer.toggle_expansion(root).unwrap();
    root
}

fn register_parent(inspector: &Inspector, result_type: &str) {
    inspector
        .add_extended_field(MODULE, "Node", "parent", result_type, |_, obj| {
            async move { Ok(obj.as_type("Node")) }.boxed_local()
        })
        .unwrap();
}

// =============================================================================
// PREPARATION
// =============================================================================

/// Types without fields of their own show base-type fields by default.
#[tokio::test]
async fn test_fieldless_type_includes_base_types() {
    let (_ts, inspector) = setup();
    let mut shape = explorer(&inspector, "Shape");
    let root = shape.root();
    shape.prepare_for_rendering(root).await.unwrap();

    assert!(shape.is_prepared(root).unwrap());
    assert!(shape.has_base_types(root).unwrap());
    assert!(shape.include_base_types(root).unwrap());
    assert_eq!(
        shape.backing_types(root).unwrap(),
        vec![TypeRef::new(MODULE, "Shape"), TypeRef::new(MODULE, "Base")]
    );

    let mut node = explorer(&inspector, "Node");
    let root = node.root();
    node.prepare_for_rendering(root).await.unwrap();
    assert!(!node.include_base_types(root).unwrap());
}

#[tokio::test]
async fn test_include_default_respects_config() {
    let (_ts, inspector) = setup();
    let config = LensConfig {
        auto_include_base_types: false,
        ..LensConfig::default()
    };
    let mut shape = TypeExplorer::new(Rc::clone(&inspector), TypeRef::new(MODULE, "Shape"), config);
    let root = shape.root();
    shape.prepare_for_rendering(root).await.unwrap();
    assert!(!shape.include_base_types(root).unwrap());
}

/// Preparation runs once; later calls keep user choices.
#[tokio::test]
async fn test_prepare_is_memoized() {
    let (_ts, inspector) = setup();
    let mut shape = explorer(&inspector, "Shape");
    let root = shape.root();
    shape.prepare_for_rendering(root).await.unwrap();
    shape.toggle_include_base_types(root).unwrap();
    shape.prepare_for_rendering(root).await.unwrap();

    assert!(!shape.include_base_types(root).unwrap());
    assert_eq!(shape.backing_types(root).unwrap().len(), 2);
}

// =============================================================================
// EXPANSION
// =============================================================================

#[tokio::test]
async fn test_expansion_follows_base_type_inclusion() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    assert!(node.is_expanded(root).unwrap());

    let names: Vec<String> = node
        .field_list(root)
        .await
        .unwrap()
        .fields
        .into_iter()
        .map(|e| e.display_name)
        .collect();
    assert_eq!(names, vec!["value", "next"]);

    node.toggle_include_base_types(root).unwrap();
    let names: Vec<String> = node
        .field_list(root)
        .await
        .unwrap()
        .fields
        .into_iter()
        .map(|e| e.display_name)
        .collect();
    assert_eq!(names, vec!["id", "value", "next"]);

    node.toggle_expansion(root).unwrap();
    assert!(!node.is_expanded(root).unwrap());
    assert!(node.field_list(root).await.unwrap().fields.is_empty());
}

/// Enabled fields below collapsed types stay visible at the root.
#[tokio::test]
async fn test_collapsed_surfaces_enabled_descendants() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;

    let next = entry(&mut node, root, "next").await;
    let child = node.child_type(next.field).await.unwrap().unwrap();
    node.prepare_for_rendering(child).await.unwrap();
    node.toggle_expansion(child).unwrap();
    let nested = entry(&mut node, child, "value").await;
    node.set_is_enabled(nested.field, true).unwrap();

    node.toggle_expansion(child).unwrap();
    node.toggle_expansion(root).unwrap();

    let list = node.field_list(root).await.unwrap();
    assert_eq!(list.fields.len(), 1);
    assert_eq!(list.fields[0].display_name, "next.value");
    assert!(list.fields[0].is_enabled);
    assert!(!list.fields[0].show_type);
}

/// Fields declared under the same name by two backing types are qualified.
#[tokio::test]
async fn test_name_collisions_are_qualified() {
    let (_ts, inspector) = setup();
    let mut shadow = explorer(&inspector, "Shadow");
    let root = expanded_root(&mut shadow).await;
    shadow.toggle_include_base_types(root).unwrap();

    let names: Vec<String> = shadow
        .field_list(root)
        .await
        .unwrap()
        .fields
        .into_iter()
        .map(|e| e.display_name)
        .collect();
    assert_eq!(names, vec!["Base::id", "Shadow::id"]);
}

// =============================================================================
// ENABLEMENT AND PATHS
// =============================================================================

/// Enabling twice notifies once; disabling notifies again.
#[tokio::test]
async fn test_set_enabled_is_idempotent() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let log = record_changes(&mut node);
    let root = expanded_root(&mut node).await;
    let value = entry(&mut node, root, "value").await;

    node.set_is_enabled(value.field, true).unwrap();
    node.set_is_enabled(value.field, true).unwrap();
    node.set_is_enabled(value.field, false).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            (FieldChangeKind::Enabled, "Node/fields/value".to_string()),
            (FieldChangeKind::Disabled, "Node/fields/value".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_child_type_only_for_types_with_fields() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;

    let value = entry(&mut node, root, "value").await;
    assert_eq!(node.child_type(value.field).await.unwrap(), None);

    let next = entry(&mut node, root, "next").await;
    assert_eq!(next.type_name.as_deref(), Some("Node"));
    let child = node.child_type(next.field).await.unwrap().unwrap();
    assert_eq!(node.child_type(next.field).await.unwrap(), Some(child));
    assert_eq!(node.parent_field(child).unwrap(), Some(next.field));
    assert_eq!(node.field(next.field).unwrap().child, Some(child));
}

/// A path replayed into a fresh explorer enables the same field.
#[tokio::test]
async fn test_enable_path_replays_compute_path() {
    let (_ts, inspector) = setup();
    let path: Vec<String> = ["Node", "fields", "next", "Node", "fields", "value"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut node = explorer(&inspector, "Node");
    let log = record_changes(&mut node);
    assert!(node.enable_path(&path).await.unwrap());
    assert_eq!(
        *log.borrow(),
        vec![(FieldChangeKind::Enabled, path.join("/"))]
    );

    let root = node.root();
    let list = node.field_list(root).await.unwrap();
    let nested = &list.fields[0];
    assert_eq!(node.compute_path(nested.field).unwrap(), path);
}

#[tokio::test]
async fn test_enable_path_missing_steps() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let path = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    assert!(!node.enable_path(&path(&["Node", "fields", "missing"])).await.unwrap());
    assert!(!node.enable_path(&path(&["Node", "bogus", "value"])).await.unwrap());
    assert!(!node.enable_path(&path(&["Other", "fields", "value"])).await.unwrap());
    assert!(!node
        .enable_path(&path(&["Node", "fields", "value", "int", "fields", "x"]))
        .await
        .unwrap());
    assert!(!node.enable_path(&path(&["Node", "fields"])).await.unwrap());
}

// =============================================================================
// REGISTRY SYNCHRONIZATION
// =============================================================================

#[tokio::test]
async fn test_registered_fields_appear_and_disappear() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let log = record_changes(&mut node);
    let root = expanded_root(&mut node).await;
    assert!(node.field_list(root).await.unwrap().extended.is_empty());

    register_parent(&inspector, "Node");
    let parent = entry(&mut node, root, "parent").await;
    assert_eq!(parent.source, FieldSource::ExtendedFields);
    node.set_is_enabled(parent.field, true).unwrap();

    assert!(inspector.remove_extended_field(MODULE, "Node", "parent"));
    assert!(node.field_list(root).await.unwrap().extended.is_empty());
    assert_eq!(
        log.borrow().last(),
        Some(&(FieldChangeKind::Disabled, "Node/extendedFields/parent".to_string()))
    );
}

/// Renames keep the field enabled under its new path.
#[tokio::test]
async fn test_rename_reannounces_enabled_field() {
    let (_ts, inspector) = setup();
    register_parent(&inspector, "Node");
    let mut node = explorer(&inspector, "Node");
    let log = record_changes(&mut node);
    let root = expanded_root(&mut node).await;
    let parent = entry(&mut node, root, "parent").await;
    node.set_is_enabled(parent.field, true).unwrap();

    assert!(inspector
        .update_extended_field(MODULE, "Node", "parent", "owner", "Node")
        .unwrap());
    assert!(node.sync());

    let view = node.field(parent.field).unwrap();
    assert_eq!(view.name, "owner");
    assert!(view.is_enabled);
    assert_eq!(
        *log.borrow(),
        vec![
            (FieldChangeKind::Enabled, "Node/extendedFields/parent".to_string()),
            (FieldChangeKind::Disabled, "Node/extendedFields/parent".to_string()),
            (FieldChangeKind::Enabled, "Node/extendedFields/owner".to_string()),
        ]
    );
}

/// A result-type change drops the old child tree.
#[tokio::test]
async fn test_type_change_resets_child() {
    let (_ts, inspector) = setup();
    register_parent(&inspector, "Node");
    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    let parent = entry(&mut node, root, "parent").await;
    let child = node.child_type(parent.field).await.unwrap().unwrap();
    assert_eq!(node.backing_types(child).unwrap()[0].name, "Node");

    inspector
        .update_extended_field(MODULE, "Node", "parent", "parent", "Base")
        .unwrap();
    node.sync();

    let view = node.field(parent.field).unwrap();
    assert_eq!(view.result_type_name.as_deref(), Some("Base"));
    assert_eq!(view.child, None);
    let retyped = node.child_type(parent.field).await.unwrap().unwrap();
    assert_ne!(retyped, child);
    assert_eq!(node.backing_types(retyped).unwrap()[0].name, "Base");
}

/// Named descriptions are listed after extended fields; primary ones are not.
#[tokio::test]
async fn test_named_descriptions_listed() {
    let (_ts, inspector) = setup();
    inspector
        .add_type_description(
            MODULE,
            "Node",
            TypeDescription::primary(|_, _| async move { Ok(Description::text("node")) }.boxed_local()),
        )
        .unwrap();
    inspector
        .add_type_description(
            MODULE,
            "Node",
            TypeDescription::named("summary", |_, _| {
                async move { Ok(Description::text("summary")) }.boxed_local()
            }),
        )
        .unwrap();
    register_parent(&inspector, "Node");

    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    let list = node.field_list(root).await.unwrap();
    let extended: Vec<(String, FieldSource)> = list
        .extended
        .into_iter()
        .map(|e| (e.display_name, e.source))
        .collect();
    assert_eq!(
        extended,
        vec![
            ("parent".to_string(), FieldSource::ExtendedFields),
            ("summary".to_string(), FieldSource::Descriptions),
        ]
    );
}

/// Disposal disables everything and drops registry listeners.
#[tokio::test]
async fn test_dispose_releases_listeners() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    let value = entry(&mut node, root, "value").await;
    node.set_is_enabled(value.field, true).unwrap();
    assert!(inspector.extended_fields().listener_count() > 0);

    assert!(node.dispose());
    assert!(!node.field(value.field).unwrap().is_enabled);
    assert_eq!(inspector.extended_fields().listener_count(), 0);
    assert_eq!(inspector.descriptions().listener_count(), 0);

    let other = explorer(&inspector, "Node");
    drop(other);
    assert_eq!(inspector.extended_fields().listener_count(), 0);
}

// =============================================================================
// FILTERING
// =============================================================================

#[tokio::test]
async fn test_search_query_filters_own_fields() {
    let (_ts, inspector) = setup();
    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    node.set_search_query(root, "val").unwrap();

    let list = node.field_list(root).await.unwrap();
    let flags: Vec<(String, bool)> = list
        .fields
        .into_iter()
        .map(|e| (e.display_name, e.is_filtered))
        .collect();
    assert_eq!(
        flags,
        vec![("value".to_string(), false), ("next".to_string(), true)]
    );

    node.set_search_query(root, "").unwrap();
    let next = entry(&mut node, root, "next").await;
    assert!(!node.is_filtered(root, next.field).unwrap());
}

// =============================================================================
// RENDERING
// =============================================================================

#[tokio::test]
async fn test_render_follows_pointers() {
    let (ts, inspector) = setup();
    ts.write(0x108, ScalarValue::Signed(42));
    ts.write_pointer(0x110, 0x200);
    ts.write(0x208, ScalarValue::Signed(7));

    let mut node = explorer(&inspector, "Node");
    let path: Vec<String> = ["Node", "fields", "next", "Node", "fields", "value"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    node.enable_path(&path).await.unwrap();
    let root = expanded_root(&mut node).await;
    let object = DbgObject::new(MODULE, "Node", 0x100);

    let value = entry(&mut node, root, "value").await;
    assert_eq!(
        node.render_field(value.field, &object).await.unwrap(),
        FieldRendering::Rendered {
            label: "value".into(),
            description: Description::text("42"),
        }
    );

    let next = entry(&mut node, root, "next").await;
    let child = node.child_type(next.field).await.unwrap().unwrap();
    let nested = entry(&mut node, child, "value").await;
    assert!(nested.is_enabled);
    assert_eq!(
        node.render_field(nested.field, &object).await.unwrap(),
        FieldRendering::Rendered {
            label: "next.value".into(),
            description: Description::text("7"),
        }
    );

    assert_eq!(
        node.render_field(next.field, &object).await.unwrap(),
        FieldRendering::Rendered {
            label: "next".into(),
            description: Description::text("Node 0x200"),
        }
    );
}

/// A change names the field, its render label and its source, so a
/// subscriber can render it once the triggering call returns.
#[tokio::test]
async fn test_change_notification_is_renderable() {
    let (ts, inspector) = setup();
    ts.write_pointer(0x110, 0x200);
    ts.write(0x208, ScalarValue::Signed(7));

    let mut node = explorer(&inspector, "Node");
    let enabled = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&enabled);
    node.on_field_change(move |change| {
        if change.kind == FieldChangeKind::Enabled {
            sink.borrow_mut()
                .push((change.field, change.label.clone(), change.source));
        }
    });
    let path: Vec<String> = ["Node", "fields", "next", "Node", "fields", "value"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert!(node.enable_path(&path).await.unwrap());

    let changes = enabled.borrow().clone();
    assert_eq!(changes.len(), 1);
    let (field, label, source) = changes[0].clone();
    assert_eq!(label, "next.value");
    assert_eq!(source, FieldSource::Fields);
    assert_eq!(
        node.render_field(field, &DbgObject::new(MODULE, "Node", 0x100))
            .await
            .unwrap(),
        FieldRendering::Rendered {
            label,
            description: Description::text("7"),
        }
    );
}

#[tokio::test]
async fn test_render_failures_and_null() {
    let (_ts, inspector) = setup();
    inspector
        .add_extended_field(MODULE, "Node", "broken", "Node", |_, _| {
            async move { Err(ResolveError::computation("boom")) }.boxed_local()
        })
        .unwrap();
    inspector
        .add_extended_field(MODULE, "Node", "empty", "Node", |_, obj| {
            async move { Ok(DbgObject::new(obj.module(), "Node", 0)) }.boxed_local()
        })
        .unwrap();

    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    let object = DbgObject::new(MODULE, "Node", 0x100);

    let broken = entry(&mut node, root, "broken").await;
    match node.render_field(broken.field, &object).await.unwrap() {
        FieldRendering::Failed { label, message } => {
            assert_eq!(label, "broken");
            assert!(message.contains("boom"));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let empty = entry(&mut node, root, "empty").await;
    assert_eq!(
        node.render_field(empty.field, &object).await.unwrap(),
        FieldRendering::Nothing
    );
}

#[tokio::test]
async fn test_render_named_description() {
    let (ts, inspector) = setup();
    ts.write(0x108, ScalarValue::Signed(3));
    inspector
        .add_type_description(
            MODULE,
            "Node",
            TypeDescription::named("summary", |inspector, obj| {
                async move {
                    let value = inspector.field(&obj, "value").await?;
                    let scalar = inspector.provider().read_scalar(&value).await?;
                    Ok(Description::Text(format!("value={}", scalar)))
                }
                .boxed_local()
            }),
        )
        .unwrap();

    let mut node = explorer(&inspector, "Node");
    let root = expanded_root(&mut node).await;
    let summary = entry(&mut node, root, "summary").await;
    assert_eq!(
        node.render_field(summary.field, &DbgObject::new(MODULE, "Node", 0x100))
            .await
            .unwrap(),
        FieldRendering::Rendered {
            label: "summary".into(),
            description: Description::text("value=3"),
        }
    );
}
