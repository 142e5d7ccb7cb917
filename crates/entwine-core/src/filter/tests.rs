use crate::{
    entity::Entity,
    error::ErrorClass,
    filter::{Criteria, RecordFilter, Suffix, parse_filter_key},
    test_fixtures::INNER,
    value::Value,
};
use proptest::prelude::*;

fn person(name: &str, age: i64, city: &str) -> Value {
    Value::record([
        ("name", Value::from(name)),
        ("age", Value::Int(age)),
        ("city", Value::from(city)),
        ("_secret", Value::from("hidden")),
    ])
}

fn people() -> Vec<Value> {
    vec![
        person("ann", 31, "Oslo"),
        person("bob", 25, "Bergen"),
        person("cat", 31, "Bergen"),
        person("dan", 40, "Tromso"),
    ]
}

fn names(rows: &[&Value]) -> Vec<String> {
    rows.iter()
        .map(|r| r.map_get("name").and_then(Value::as_text).unwrap().to_string())
        .collect()
}

fn filtered(criteria: Criteria) -> Vec<String> {
    let mut f = RecordFilter::new(people()).unwrap();
    f.filter(&criteria).unwrap();
    names(&f.results())
}

// ---- keys --------------------------------------------------------------

#[test]
fn filter_keys_split_once() {
    assert_eq!(parse_filter_key("age").unwrap(), ("age", None));
    assert_eq!(parse_filter_key("age__gte").unwrap(), ("age", Some("gte")));

    let err = parse_filter_key("a__b__c").unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidQuery);
}

#[test]
fn suffixes_are_case_insensitive() {
    assert_eq!("GTE".parse::<Suffix>().unwrap(), Suffix::Gte);
    assert_eq!("NotIn".parse::<Suffix>().unwrap(), Suffix::NotIn);

    let err = "between".parse::<Suffix>().unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidQuery);
    assert!(err.message.contains("__ncontains"));
}

// ---- matching ----------------------------------------------------------

#[test]
fn equality_and_negation() {
    assert_eq!(filtered(Criteria::new().with("city", "Bergen")), vec!["bob", "cat"]);
    assert_eq!(
        filtered(Criteria::new().with("city__neq", "Bergen")),
        vec!["ann", "dan"]
    );
}

#[test]
fn ordering_operators_are_inclusive() {
    assert_eq!(
        filtered(Criteria::new().with("age__gte", 31i64)),
        vec!["ann", "cat", "dan"]
    );
    assert_eq!(
        filtered(Criteria::new().with("age__lte", 31i64)),
        vec!["ann", "bob", "cat"]
    );
}

#[test]
fn ordering_across_variants_never_matches() {
    assert!(filtered(Criteria::new().with("age__gte", "10")).is_empty());
    assert!(filtered(Criteria::new().with("age__lte", 99.5)).is_empty());
}

#[test]
fn membership_operators() {
    let cities = Value::from_list(vec!["Oslo", "Tromso"]);

    assert_eq!(
        filtered(Criteria::new().with("city__in", cities.clone())),
        vec!["ann", "dan"]
    );
    assert_eq!(
        filtered(Criteria::new().with("city__notin", cities)),
        vec!["bob", "cat"]
    );
}

#[test]
fn membership_requires_a_collection() {
    let mut f = RecordFilter::new(people()).unwrap();
    let err = f
        .filter(&Criteria::new().with("age__in", 31i64))
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::InvalidQuery);
}

#[test]
fn contains_is_substring_on_text() {
    assert_eq!(
        filtered(Criteria::new().with("city__contains", "erg")),
        vec!["bob", "cat"]
    );
    assert_eq!(
        filtered(Criteria::new().with("city__ncontains", "erg")),
        vec!["ann", "dan"]
    );
    // ints have no containment
    assert!(filtered(Criteria::new().with("age__contains", 3i64)).is_empty());
    assert!(filtered(Criteria::new().with("age__ncontains", 3i64)).is_empty());
}

#[test]
fn clauses_are_conjunctive() {
    let criteria = Criteria::new()
        .with("city", "Bergen")
        .with("age__gte", 30i64);

    assert_eq!(filtered(criteria), vec!["cat"]);
}

#[test]
fn filter_restarts_from_all_records() {
    let mut f = RecordFilter::new(people()).unwrap();
    f.filter(&Criteria::new().with("city", "Oslo")).unwrap();
    f.filter(&Criteria::new().with("city", "Bergen")).unwrap();

    assert_eq!(names(&f.results()), vec!["bob", "cat"]);
}

// ---- validation --------------------------------------------------------

#[test]
fn unknown_and_private_attributes_are_rejected() {
    let mut f = RecordFilter::new(people()).unwrap();

    let err = f.filter(&Criteria::new().with("zip", 1i64)).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidQuery);
    assert!(err.message.contains("zip"));

    let err = f
        .filter(&Criteria::new().with("_secret", "hidden"))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidQuery);
}

#[test]
fn heterogeneous_records_are_rejected() {
    let err = RecordFilter::new(vec![person("a", 1, "x"), Value::Int(3)]).unwrap_err();
    assert_eq!(err.class, ErrorClass::MalformedInput);
    assert!(err.message.contains("record 1"));

    let odd = Value::record([("name", "z")]);
    let err = RecordFilter::new(vec![person("a", 1, "x"), odd]).unwrap_err();
    assert_eq!(err.class, ErrorClass::MalformedInput);
}

#[test]
fn empty_input_filters_to_empty() {
    let mut f = RecordFilter::<Value>::new(vec![]).unwrap();
    f.filter(&Criteria::new().with("anything", 1i64)).unwrap();

    assert!(f.is_empty());
}

// ---- sorting -----------------------------------------------------------

#[test]
fn multi_key_sort() {
    let mut f = RecordFilter::new(people()).unwrap();
    f.sort("age__desc, name").unwrap();
    assert_eq!(names(&f.results()), vec!["dan", "ann", "cat", "bob"]);

    f.sort("city__ASC,age__desc").unwrap();
    assert_eq!(names(&f.results()), vec!["cat", "bob", "ann", "dan"]);
}

#[test]
fn sort_applies_to_filtered_view() {
    let mut f = RecordFilter::new(people()).unwrap();
    f.filter(&Criteria::new().with("age", 31i64))
        .unwrap()
        .sort("name__desc")
        .unwrap();

    assert_eq!(names(&f.results()), vec!["cat", "ann"]);
}

#[test]
fn bad_sort_order_is_rejected() {
    let mut f = RecordFilter::new(people()).unwrap();
    let err = f.sort("age__sideways").unwrap_err();

    assert_eq!(err.class, ErrorClass::InvalidQuery);
}

#[test]
fn top_and_bottom() {
    let mut f = RecordFilter::new(people()).unwrap();
    f.sort("age").unwrap();

    assert_eq!(names(&f.top(2)), vec!["bob", "ann"]);
    assert_eq!(names(&f.bottom(1)), vec!["dan"]);
    assert_eq!(f.top(10).len(), 4);
    assert_eq!(f.bottom(0).len(), 0);
}

#[test]
fn into_results_keeps_view_order() {
    let mut f = RecordFilter::new(people()).unwrap();
    f.sort("name__desc").unwrap();
    let owned = f.into_results();

    assert_eq!(owned[0].map_get("name"), Some(&Value::from("dan")));
    assert_eq!(owned.len(), 4);
}

#[test]
fn entities_are_records() {
    let rows = ["b", "a", "c"]
        .into_iter()
        .map(|name| Entity::from_fields(&INNER, [("name", name)]).unwrap())
        .collect();

    let mut f = RecordFilter::new(rows).unwrap();
    f.filter(&Criteria::new().with("name__neq", "c"))
        .unwrap()
        .sort("name")
        .unwrap();

    let got: Vec<_> = f.results().iter().map(|e| e.get_text("name").unwrap()).collect();
    assert_eq!(got, vec!["a", "b"]);
}

proptest! {
    #[test]
    fn sort_is_stable_for_equal_keys(keys in prop::collection::vec(0i64..4, 0..24)) {
        let rows: Vec<Value> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| Value::record([("k", Value::Int(*k)), ("pos", Value::Int(i64::try_from(i).unwrap()))]))
            .collect();

        let mut f = RecordFilter::new(rows).unwrap();
        f.sort("k__desc").unwrap();
        let out = f.results();

        for pair in out.windows(2) {
            let (ka, kb) = (pair[0].map_get("k").unwrap(), pair[1].map_get("k").unwrap());
            let (pa, pb) = (pair[0].map_get("pos").unwrap(), pair[1].map_get("pos").unwrap());
            prop_assert!(ka.as_int() >= kb.as_int());
            if ka == kb {
                prop_assert!(pa.as_int() < pb.as_int());
            }
        }
    }
}
