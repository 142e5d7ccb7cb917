//! Test-only models shared by unit tests.
//!
//! `Inner` is a small named record; `Outer` exercises every field shape the
//! transformer and validator handle.

use crate::{
    entity_ref,
    model::{EntityModel, FieldDefault, FieldKind, FieldModel},
};

///
/// Inner
///

pub static INNER: EntityModel = EntityModel::new("Inner", &INNER_FIELDS);

static INNER_FIELDS: [FieldModel; 2] = [
    FieldModel::optional("id", FieldKind::UuidStr),
    FieldModel::required("name", FieldKind::Text),
];

pub static INNER_KIND: FieldKind = FieldKind::Entity(entity_ref!(INNER));

///
/// Outer
///

pub static OUTER: EntityModel = EntityModel::new("Outer", &OUTER_FIELDS);

static OUTER_FIELDS: [FieldModel; 8] = [
    FieldModel::optional("id", FieldKind::Optional(&UUID_STR_KIND)),
    FieldModel::required("timestamp", FieldKind::Timestamp),
    FieldModel::required("value", FieldKind::Float),
    FieldModel::optional("flag", FieldKind::Optional(&BOOL_KIND)),
    FieldModel::required("inner", FieldKind::Entity(entity_ref!(INNER))),
    FieldModel::new("tags", FieldKind::List(&TEXT_KIND), FieldDefault::EmptyList),
    FieldModel::new(
        "metadata",
        FieldKind::Map {
            key: &TEXT_KIND,
            value: &INT_KIND,
        },
        FieldDefault::EmptyMap,
    ),
    FieldModel::new(
        "nested_list",
        FieldKind::Relation(&INNER_KIND),
        FieldDefault::EmptyList,
    ),
];

pub static OUTER_KIND: FieldKind = FieldKind::Entity(entity_ref!(OUTER));

static UUID_STR_KIND: FieldKind = FieldKind::UuidStr;
static BOOL_KIND: FieldKind = FieldKind::Bool;
static TEXT_KIND: FieldKind = FieldKind::Text;
static INT_KIND: FieldKind = FieldKind::Int;

///
/// Marker misuse
///
/// Models that declare entity collections with the wrong marker.
///

pub static UNMARKED: EntityModel = EntityModel::new("Unmarked", &UNMARKED_FIELDS);

static UNMARKED_FIELDS: [FieldModel; 1] = [FieldModel::new(
    "items",
    FieldKind::List(&INNER_KIND),
    FieldDefault::EmptyList,
)];

pub static MISMARKED: EntityModel = EntityModel::new("Mismarked", &MISMARKED_FIELDS);

static MISMARKED_FIELDS: [FieldModel; 1] = [FieldModel::new(
    "names",
    FieldKind::Relation(&TEXT_KIND),
    FieldDefault::EmptyList,
)];

pub static UNMARKED_LENIENT: EntityModel =
    EntityModel::new("UnmarkedLenient", &UNMARKED_FIELDS).lenient();

///
/// Node
/// Self-referencing model.
///

pub static NODE: EntityModel = EntityModel::new("Node", &NODE_FIELDS);

static NODE_FIELDS: [FieldModel; 3] = [
    FieldModel::optional("id", FieldKind::UuidStr),
    FieldModel::required("label", FieldKind::Text),
    FieldModel::new(
        "children",
        FieldKind::Relation(&NODE_KIND),
        FieldDefault::EmptyList,
    ),
];

static NODE_KIND: FieldKind = FieldKind::Entity(entity_ref!(NODE));
