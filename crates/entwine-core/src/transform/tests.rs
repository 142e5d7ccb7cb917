use crate::{
    error::ErrorClass,
    test_fixtures::{INNER, OUTER},
    transform::Transformer,
    types::uuid::UuidOptions,
    value::Value,
};
use serde_json::json;

const ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

// ---- helpers -----------------------------------------------------------

fn outer_json() -> serde_json::Value {
    json!({
        "id": ID.to_uppercase(),
        "timestamp": "2024-01-01T12:00:00+00:00",
        "value": 3,
        "flag": true,
        "inner": {"id": "a3bb189e-8bf9-3888-9912-ace4e6543002", "name": "in"},
        "tags": ["x", "y"],
        "metadata": {"a": 1},
        "nested_list": [
            {"id": "c9bf9e57-1685-4c89-bafb-ff5af830be8a", "name": "A"},
            {"id": "7c9e6679-7425-40de-944b-e07fc1f90ae7", "name": "B"}
        ],
        "ignored": "unknown keys are dropped"
    })
}

fn built() -> Transformer {
    let mut t = Transformer::for_model(&OUTER);
    t.import(outer_json()).unwrap();
    t
}

fn nested_names(t: &Transformer) -> Vec<String> {
    t.entity()
        .unwrap()
        .get_related("nested_list")
        .iter()
        .map(|e| e.get_text("name").unwrap().to_string())
        .collect()
}

// ---- build -------------------------------------------------------------

#[test]
fn build_coerces_and_normalizes() {
    let t = built();
    let outer = t.entity().unwrap();

    assert_eq!(outer.pk(), Some(ID));
    assert_eq!(outer.get("value"), Some(&Value::Float(3.0)));
    assert!(matches!(outer.get("timestamp"), Some(Value::Timestamp(_))));
    assert_eq!(outer.get_entity("inner").unwrap().get_text("name"), Some("in"));
    assert_eq!(nested_names(&t), vec!["A", "B"]);
}

#[test]
fn build_from_json_text() {
    let mut t = Transformer::for_model(&INNER);
    t.import(r#"{"name": "from text"}"#).unwrap();

    assert_eq!(t.entity().unwrap().get_text("name"), Some("from text"));
}

#[test]
fn malformed_json_is_malformed_input() {
    let mut t = Transformer::for_model(&INNER);
    let err = t.import("{not json").unwrap_err();

    assert_eq!(err.class, ErrorClass::MalformedInput);
    assert!(err.message.contains("invalid JSON"));
}

#[test]
fn non_object_json_is_type_mismatch() {
    let mut t = Transformer::for_model(&INNER);

    let err = t.import("[1, 2]").unwrap_err();
    assert_eq!(err.class, ErrorClass::TypeMismatch);

    let err = t.import(Value::Int(4)).unwrap_err();
    assert_eq!(err.class, ErrorClass::TypeMismatch);
}

#[test]
fn build_failure_surfaces_validation_error() {
    let mut t = Transformer::for_model(&INNER);
    let err = t.import(json!({"name": 12})).unwrap_err();

    assert_eq!(err.class, ErrorClass::TypeMismatch);
    assert!(err.message.contains("Inner.name"));
    assert!(t.entity().is_none());
}

// ---- round trip --------------------------------------------------------

#[test]
fn export_then_build_is_structurally_equal() {
    let original = built().into_entity().unwrap();

    let json = Transformer::for_entity(original.clone()).as_json().unwrap();
    let mut again = Transformer::for_model(&OUTER);
    again.import(json).unwrap();

    assert!(again.entity().unwrap().same_fields(&original));

    let dict = Transformer::for_entity(original.clone()).as_dict().unwrap();
    let mut again = Transformer::for_model(&OUTER);
    again.import(dict).unwrap();

    assert!(again.entity().unwrap().same_fields(&original));
}

#[test]
fn json_export_stringifies_leaves() {
    let json: serde_json::Value = serde_json::from_str(&built().as_json().unwrap()).unwrap();

    assert_eq!(json["id"], json!(ID));
    assert_eq!(json["timestamp"], json!("2024-01-01T12:00:00Z"));
    assert_eq!(json["nested_list"][1]["name"], json!("B"));
}

#[test]
fn export_without_instance_fails() {
    let t = Transformer::for_model(&INNER);

    assert_eq!(t.as_dict().unwrap_err().class, ErrorClass::TypeMismatch);
    assert!(t.as_json().is_err());
    assert!(t.into_entity().is_err());
}

// ---- patch -------------------------------------------------------------

#[test]
fn patch_leaves_untouched_fields_alone() {
    let mut t = built();
    let before = t.entity().unwrap().clone();

    t.import(json!({"value": 9})).unwrap();
    let after = t.entity().unwrap();

    assert_eq!(after.get("value"), Some(&Value::Float(9.0)));
    for name in ["id", "timestamp", "flag", "inner", "tags", "metadata", "nested_list"] {
        assert!(
            after.get(name).unwrap().structural_eq(before.get(name).unwrap()),
            "{name} changed"
        );
    }
}

#[test]
fn nested_entity_is_patched_in_place() {
    let mut t = built();
    t.import(json!({"inner": {"name": "renamed"}})).unwrap();

    let inner = t.entity().unwrap().get_entity("inner").unwrap();
    assert_eq!(inner.get_text("name"), Some("renamed"));
    assert_eq!(inner.pk(), Some("a3bb189e-8bf9-3888-9912-ace4e6543002"));
}

#[test]
fn relationship_patch_is_positional() {
    let mut t = built();
    let ids_before: Vec<_> = t
        .entity()
        .unwrap()
        .get_related("nested_list")
        .iter()
        .map(|e| e.pk().map(str::to_string))
        .collect();

    t.import(json!({"nested_list": [{"name": "X2"}, {"name": "Y2"}]}))
        .unwrap();

    let ids_after: Vec<_> = t
        .entity()
        .unwrap()
        .get_related("nested_list")
        .iter()
        .map(|e| e.pk().map(str::to_string))
        .collect();

    assert_eq!(nested_names(&t), vec!["X2", "Y2"]);
    assert_eq!(ids_before, ids_after, "existing elements keep their identity");
}

#[test]
fn relationship_patch_appends_and_truncates() {
    let mut t = built();

    t.import(json!({"nested_list": [{"name": "A2"}, {"name": "B2"}, {"name": "C"}]}))
        .unwrap();
    assert_eq!(nested_names(&t), vec!["A2", "B2", "C"]);

    t.import(json!({"nested_list": [{"name": "only"}]})).unwrap();
    assert_eq!(nested_names(&t), vec!["only"]);
}

#[test]
fn patch_normalizes_pk_and_revalidates() {
    let mut t = built();

    let upper = "7C9E6679-7425-40DE-944B-E07FC1F90AE7";
    t.import(json!({"id": upper})).unwrap();
    assert_eq!(
        t.entity().unwrap().pk(),
        Some("7c9e6679-7425-40de-944b-e07fc1f90ae7")
    );

    let err = t.import(json!({"flag": "nope"})).unwrap_err();
    assert_eq!(err.class, ErrorClass::TypeMismatch);
}

#[test]
fn importing_an_entity_patches_from_its_fields() {
    let mut t = built();
    let mut donor = t.entity().unwrap().clone();
    donor.set("tags", Value::from_list(vec!["z"])).unwrap();

    t.import(donor).unwrap();

    assert_eq!(
        t.entity().unwrap().get("tags"),
        Some(&Value::from_list(vec!["z"]))
    );
}

#[test]
fn key_switches_apply_at_every_level() {
    let mut strict = Transformer::for_model(&OUTER).uuid_options(UuidOptions::STRICT);
    let mut data = outer_json();
    data["nested_list"][1]["id"] = json!("");
    let err = strict.import(data).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidUuid);

    let mut lenient = Transformer::for_model(&INNER).uuid_options(UuidOptions::LENIENT);
    lenient.import(json!({"id": "not-a-key", "name": "n"})).unwrap();
    assert_eq!(lenient.entity().unwrap().pk(), None);

    let err = Transformer::for_model(&INNER)
        .import(json!({"id": "not-a-key", "name": "n"}))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidUuid);
}
