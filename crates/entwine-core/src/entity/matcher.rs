//! Typed-value matcher.
//!
//! Decides whether a dynamic value conforms to a declared field kind.
//! Pure; strict relationship-marker checks live in the validator.

use crate::{model::FieldKind, types::UuidStr, value::Value};

/// True when `value` conforms to `kind`.
///
/// Rules, first applicable wins:
/// 1. `Optional` / `Union` accept when any branch does (`Null` for `Optional`)
/// 2. `Relation(T)` / `List(T)` need a list whose elements all match `T`
/// 3. `UuidStr` needs a value `UuidStr::new` accepts
/// 4. nominal kinds need the matching variant (`Entity(T)` by entity name)
/// 5. `Map` and `Any` are accepted without inspection
#[must_use]
pub fn matches(value: &Value, kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Optional(inner) => value.is_null() || matches(value, inner),
        FieldKind::Union(kinds) => kinds.iter().any(|k| matches(value, k)),

        FieldKind::Relation(inner) | FieldKind::List(inner) => match value {
            Value::List(items) => items.iter().all(|item| matches(item, inner)),
            _ => false,
        },

        FieldKind::UuidStr => UuidStr::new(value).is_ok(),

        FieldKind::Bool => matches!(value, Value::Bool(_)),
        FieldKind::Date => matches!(value, Value::Date(_)),
        FieldKind::Float => matches!(value, Value::Float(_)),
        FieldKind::Int => matches!(value, Value::Int(_)),
        FieldKind::Text => matches!(value, Value::Text(_)),
        FieldKind::Timestamp => matches!(value, Value::Timestamp(_)),
        FieldKind::Uuid => matches!(value, Value::Uuid(_)),
        FieldKind::Entity(target) => value
            .as_entity()
            .is_some_and(|entity| entity.entity_name() == target.name()),

        // fail open
        FieldKind::Any | FieldKind::Map { .. } => true,
    }
}

///
/// TESTS
///
