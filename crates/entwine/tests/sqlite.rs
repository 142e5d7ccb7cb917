//! Food graphs persisted through the relational backend.

use entwine::{
    core::db::{IntoEntity, SqliteStore},
    prelude::*,
};
use entwine_schema_food::{FOOD, FOOD_NUTRIENT, INGREDIENT, NUTRIENT};
use serde_json::json;

fn catalogue(store: &SqliteStore) -> Entity {
    let food = store
        .from_dict(&Value::from(json!({
            "remote_id": 7,
            "description": "Trail Mix",
            "publication_date": "2020-01-15",
            "ingredients": [{"name": "peanuts"}, {"name": "raisins"}, {"name": "almonds"}],
            "nutrients": [
                {"amount": 9.0, "nutrient": {"name": "Protein", "unitname": "G"}}
            ],
            "label_nutrients": {"calories": 160.0}
        })))
        .unwrap();

    store.insert(food).unwrap()
}

fn names(food: &Entity) -> Vec<String> {
    food.get_related("ingredients")
        .iter()
        .filter_map(|i| i.get_text("name").map(str::to_string))
        .collect()
}

#[test]
fn graphs_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("food.db");

    let pk = {
        let store = SqliteStore::open(&path, &FOOD).unwrap();
        catalogue(&store).pk().unwrap().to_string()
    };

    let store = SqliteStore::open(&path, &FOOD).unwrap();
    let food = store.get(&pk).unwrap().unwrap();

    assert_eq!(names(&food), vec!["peanuts", "raisins", "almonds"]);
    assert_eq!(food.get_text("description"), Some("Trail Mix"));
    assert!(matches!(food.get("publication_date"), Some(Value::Date(_))));
    assert_eq!(
        food.get_entity("label_nutrients").unwrap().get_float("calories"),
        Some(160.0)
    );

    let measurement = food.get_related("nutrients")[0];
    assert_eq!(
        measurement.get_entity("nutrient").unwrap().get_text("name"),
        Some("Protein")
    );
}

#[test]
fn children_are_rows_of_their_own() {
    let store = SqliteStore::open_in_memory(&FOOD).unwrap();
    catalogue(&store);

    let ingredients = store.sibling(&INGREDIENT).unwrap();
    assert_eq!(ingredients.scan().unwrap().len(), 3);
    assert_eq!(
        ingredients
            .filter(&Criteria::new().with("name__in", Value::from_list(vec!["peanuts", "cashews"])))
            .unwrap()
            .len(),
        1
    );

    // embedded, not related
    let measurements = store.sibling(&FOOD_NUTRIENT).unwrap();
    assert_eq!(measurements.scan().unwrap().len(), 1);
    assert!(store.sibling(&NUTRIENT).unwrap().scan().unwrap().is_empty());
}

#[test]
fn updates_relink_children() {
    let store = SqliteStore::open_in_memory(&FOOD).unwrap();
    let food = catalogue(&store);
    let pk = food.pk().unwrap().to_string();

    let patched = store
        .patch_dict(&pk, &Value::from(json!({"ingredients": [{"name": "cashews"}]})))
        .unwrap();
    assert_eq!(names(&patched), vec!["cashews"]);
    assert_eq!(names(&store.get(&pk).unwrap().unwrap()), vec!["cashews"]);

    store.delete(&pk).unwrap();
    assert!(store.get(&pk).unwrap().is_none());
    assert_eq!(store.sibling(&INGREDIENT).unwrap().scan().unwrap().len(), 3);
}

#[test]
fn rows_carry_bookkeeping_timestamps() {
    let store = SqliteStore::open_in_memory(&FOOD).unwrap();
    let food = catalogue(&store);
    let row = store.get_row(food.pk().unwrap()).unwrap().unwrap();

    assert_eq!(row.model().entity_name, "Food");
    assert!(row.date_created <= row.date_updated);
    assert!(row.to_entity().unwrap().same_fields(&food));

    let dict = store.to_dict(&row).unwrap();
    assert_eq!(dict.map_get("description"), Some(&Value::from("Trail Mix")));
}
