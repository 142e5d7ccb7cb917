use crate::{
    db::{IntoEntity, SqliteStore, Store},
    entity::Entity,
    error::ErrorClass,
    test_fixtures::{INNER, NODE, OUTER},
    value::Value,
};
use serde_json::json;

fn outer_with_children(store: &SqliteStore) -> Entity {
    let entity = store
        .from_dict(&Value::from(json!({
            "timestamp": "2024-05-01T08:30:00Z",
            "value": 4,
            "inner": {"name": "embedded"},
            "nested_list": [{"name": "first"}, {"name": "second"}]
        })))
        .unwrap();

    store.insert(entity).unwrap()
}

fn count(store: &SqliteStore, table: &str) -> i64 {
    store
        .connection()
        .lock()
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .unwrap()
}

fn child_names(entity: &Entity) -> Vec<&str> {
    entity
        .get_related("nested_list")
        .iter()
        .map(|e| e.get_text("name").unwrap())
        .collect()
}

#[test]
fn children_are_cascaded_and_eagerly_loaded() {
    let store = SqliteStore::open_in_memory(&OUTER).unwrap();
    let stored = outer_with_children(&store);

    assert!(stored.get_related("nested_list").iter().all(|c| c.pk().is_some()));
    assert_eq!(count(&store, "Inner"), 2);
    assert_eq!(count(&store, "Outer__nested_list"), 2);

    let loaded = store.get(stored.pk().unwrap()).unwrap().unwrap();
    assert_eq!(child_names(&loaded), vec!["first", "second"]);
    assert!(loaded.same_fields(&stored));
}

#[test]
fn children_are_readable_through_their_own_store() {
    let store = SqliteStore::open_in_memory(&OUTER).unwrap();
    let stored = outer_with_children(&store);
    let inners = store.sibling(&INNER).unwrap();

    let first = stored.get_related("nested_list")[0];
    let found = inners.get(first.pk().unwrap()).unwrap().unwrap();
    assert_eq!(found.get_text("name"), Some("first"));
}

#[test]
fn relinking_replaces_positions() {
    let store = SqliteStore::open_in_memory(&OUTER).unwrap();
    let stored = outer_with_children(&store);
    let pk = stored.pk().unwrap().to_string();

    store
        .patch_dict(&pk, &Value::from(json!({"nested_list": [{"name": "only"}]})))
        .unwrap();

    let loaded = store.get(&pk).unwrap().unwrap();
    assert_eq!(child_names(&loaded), vec!["only"]);
    assert_eq!(count(&store, "Outer__nested_list"), 1);
}

#[test]
fn deleting_a_parent_drops_links_but_keeps_children() {
    let store = SqliteStore::open_in_memory(&OUTER).unwrap();
    let stored = outer_with_children(&store);

    store.delete(stored.pk().unwrap()).unwrap();

    assert_eq!(count(&store, "Outer"), 0);
    assert_eq!(count(&store, "Outer__nested_list"), 0);
    assert_eq!(count(&store, "Inner"), 2);
}

#[test]
fn deleting_a_child_unlinks_it() {
    let store = SqliteStore::open_in_memory(&OUTER).unwrap();
    let stored = outer_with_children(&store);
    let inners = store.sibling(&INNER).unwrap();

    let first = stored.get_related("nested_list")[0].pk().unwrap().to_string();
    inners.delete(&first).unwrap();

    let loaded = store.get(stored.pk().unwrap()).unwrap().unwrap();
    assert_eq!(child_names(&loaded), vec!["second"]);
}

#[test]
fn self_referencing_trees_round_trip() {
    let store = SqliteStore::open_in_memory(&NODE).unwrap();
    let root = store
        .from_dict(&Value::from(json!({
            "label": "root",
            "children": [
                {"label": "a", "children": [{"label": "a1"}]},
                {"label": "b"}
            ]
        })))
        .unwrap();
    let root = store.insert(root).unwrap();

    let loaded = store.get(root.pk().unwrap()).unwrap().unwrap();
    let a = loaded.get_related("children")[0];
    assert_eq!(a.get_text("label"), Some("a"));
    assert_eq!(a.get_related("children")[0].get_text("label"), Some("a1"));
    assert_eq!(store.scan().unwrap().len(), 4);
}

#[test]
fn failed_writes_roll_back() {
    let store = SqliteStore::open_in_memory(&NODE).unwrap();
    let key = "0f8fad5b-d9cb-469f-a165-70867728950e";

    let fresh = Entity::from_fields(&NODE, [("label", "fresh")]).unwrap();
    let cyclic = Entity::from_fields(
        &NODE,
        [("id", Value::from(key)), ("label", Value::from("loop"))],
    )
    .unwrap();
    let root = Entity::from_fields(
        &NODE,
        [
            ("id", Value::from(key)),
            ("label", Value::from("root")),
            ("children", Value::from_list(vec![fresh, cyclic])),
        ],
    )
    .unwrap();

    let err = store.insert(root).unwrap_err();
    assert_eq!(err.class, ErrorClass::MalformedInput);
    assert_eq!(count(&store, "Node"), 0, "child written before the failure is rolled back");
}

#[test]
fn row_timestamps_track_writes() {
    let store = SqliteStore::open_in_memory(&INNER).unwrap();
    let stored = store
        .insert(Entity::from_fields(&INNER, [("name", "t")]).unwrap())
        .unwrap();
    let pk = stored.pk().unwrap().to_string();
    let before = store.get_row(&pk).unwrap().unwrap();

    let mut changed = stored.clone();
    changed.set("name", "t2").unwrap();
    store.update(changed).unwrap();
    let after = store.get_row(&pk).unwrap().unwrap();

    assert_eq!(after.date_created, before.date_created);
    assert!(after.date_updated >= before.date_updated);
    assert_eq!(after.to_entity().unwrap().get_text("name"), Some("t2"));
}

#[test]
fn typed_leaves_survive_storage() {
    let store = SqliteStore::open_in_memory(&OUTER).unwrap();
    let stored = outer_with_children(&store);
    let loaded = store.get(stored.pk().unwrap()).unwrap().unwrap();

    assert!(matches!(loaded.get("timestamp"), Some(Value::Timestamp(_))));
    assert_eq!(loaded.get("value"), Some(&Value::Float(4.0)));
    assert_eq!(
        loaded.get_entity("inner").unwrap().get_text("name"),
        Some("embedded")
    );
}

#[test]
fn file_databases_persist_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entwine.db");

    let pk = {
        let store = SqliteStore::open(&path, &OUTER).unwrap();
        outer_with_children(&store).pk().unwrap().to_string()
    };

    let reopened = SqliteStore::open(&path, &OUTER).unwrap();
    let loaded = reopened.get(&pk).unwrap().unwrap();
    assert_eq!(child_names(&loaded), vec!["first", "second"]);
}
