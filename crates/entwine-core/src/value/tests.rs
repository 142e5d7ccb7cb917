use crate::value::{Value, canonical_cmp, contains, loose_eq, strict_order_cmp};
use serde_json::json;
use std::cmp::Ordering;
use time::macros::{date, datetime};
use uuid::Uuid;

// ---- helpers -----------------------------------------------------------

fn v_txt(s: &str) -> Value {
    Value::Text(s.to_string())
}

// ---- ordering ----------------------------------------------------------

#[test]
fn canonical_order_puts_null_first_and_mixes_numbers() {
    let mut values = vec![v_txt("b"), Value::Float(2.5), Value::Null, Value::Int(2), v_txt("a")];
    values.sort_by(canonical_cmp);

    assert_eq!(
        values,
        vec![Value::Null, Value::Int(2), Value::Float(2.5), v_txt("a"), v_txt("b")]
    );
}

#[test]
fn strict_order_requires_same_variant() {
    assert_eq!(
        strict_order_cmp(&Value::Int(1), &Value::Int(2)),
        Some(Ordering::Less)
    );
    assert_eq!(strict_order_cmp(&Value::Int(1), &Value::Float(2.0)), None);
    assert_eq!(strict_order_cmp(&v_txt("a"), &Value::Int(2)), None);
    assert_eq!(
        strict_order_cmp(
            &Value::Date(date!(2024 - 01 - 02)),
            &Value::Date(date!(2024 - 01 - 01))
        ),
        Some(Ordering::Greater)
    );
}

#[test]
fn loose_eq_bridges_int_and_float() {
    assert!(loose_eq(&Value::Int(3), &Value::Float(3.0)));
    assert!(!loose_eq(&Value::Int(3), &v_txt("3")));
}

// ---- containment -------------------------------------------------------

#[test]
fn contains_dispatches_on_haystack() {
    assert_eq!(contains(&v_txt("Granola Bar"), &v_txt("Granola")), Some(true));
    assert_eq!(
        contains(&Value::from_list(vec![1i64, 2, 3]), &Value::Int(2)),
        Some(true)
    );
    assert_eq!(
        contains(&Value::record([("k", 1i64)]), &v_txt("k")),
        Some(true)
    );
    assert_eq!(contains(&Value::Int(12), &Value::Int(1)), None);
}

// ---- mappings ----------------------------------------------------------

#[test]
fn map_helpers_preserve_order() {
    let mut map = Value::record([("b", 1i64), ("a", 2i64)]);
    map.map_insert("c", Value::Bool(true));
    map.map_insert("b", Value::Int(9));

    assert_eq!(map.map_keys(), vec!["b", "a", "c"]);
    assert_eq!(map.map_get("b"), Some(&Value::Int(9)));
    assert!(!map.map_contains("z"));
}

#[test]
fn structural_eq_ignores_map_entry_order() {
    let left = Value::record([("a", 1i64), ("b", 2i64)]);
    let right = Value::record([("b", 2i64), ("a", 1i64)]);

    assert!(left.structural_eq(&right));
    assert_ne!(left, right);
}

// ---- json --------------------------------------------------------------

#[test]
fn json_leaves_render_as_strings() {
    let id = Uuid::nil();
    let value = Value::record([
        ("id", Value::Uuid(id)),
        ("day", Value::Date(date!(2024 - 05 - 06))),
        ("at", Value::Timestamp(datetime!(2024-05-06 07:08:09 UTC))),
        ("n", Value::Float(1.5)),
    ]);

    assert_eq!(
        value.to_json(),
        json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "day": "2024-05-06",
            "at": "2024-05-06T07:08:09Z",
            "n": 1.5,
        })
    );
    assert_eq!(
        serde_json::to_value(&value).unwrap(),
        value.to_json(),
        "Serialize and to_json must agree"
    );
}

#[test]
fn json_numbers_prefer_int() {
    let value = Value::from(json!({"i": 4, "f": 4.5, "list": [1, null]}));

    assert_eq!(value.map_get("i"), Some(&Value::Int(4)));
    assert_eq!(value.map_get("f"), Some(&Value::Float(4.5)));
    assert_eq!(
        value.map_get("list"),
        Some(&Value::List(vec![Value::Int(1), Value::Null]))
    );
}
