//! Field coercion for untyped input.
//!
//! Converts what JSON and loosely-typed callers hand us into the shape the
//! declared kind expects. Anything without a rule passes through unchanged
//! and is left for validation to judge.

use crate::{
    error::{Error, ErrorOrigin},
    model::FieldKind,
    transform::{Options, build},
    types::date,
    value::Value,
};
use uuid::Uuid;

/// Coerce a value toward a declared kind.
pub fn coerce(kind: &FieldKind, value: Value) -> Result<Value, Error> {
    coerce_with(kind, value, Options::default())
}

pub(crate) fn coerce_with(kind: &FieldKind, value: Value, opts: Options) -> Result<Value, Error> {
    match (kind, value) {
        (FieldKind::Optional(_), Value::Null) => Ok(Value::Null),
        (FieldKind::Optional(inner), value) => coerce_with(inner, value, opts),

        (FieldKind::Relation(inner), Value::List(items)) => {
            let items = items
                .into_iter()
                .map(|item| coerce_element(inner, item, opts))
                .collect::<Result<_, _>>()?;

            Ok(Value::List(items))
        }
        (FieldKind::List(inner), Value::List(items)) => {
            let items = items
                .into_iter()
                .map(|item| coerce_with(inner, item, opts))
                .collect::<Result<_, _>>()?;

            Ok(Value::List(items))
        }
        (FieldKind::Map { key, value: val }, Value::Map(entries)) => {
            let entries = entries
                .into_iter()
                .map(|(k, v)| Ok((coerce_with(key, k, opts)?, coerce_with(val, v, opts)?)))
                .collect::<Result<_, Error>>()?;

            Ok(Value::Map(entries))
        }

        (FieldKind::Entity(target), value @ Value::Map(_)) => {
            build(target.resolve(), &value, opts).map(Value::from)
        }

        (FieldKind::Uuid, Value::Text(text)) => Uuid::parse_str(&text)
            .map(Value::Uuid)
            .map_err(|_| Error::invalid_uuid(format!("invalid UUID string: {text}"))),
        (FieldKind::Timestamp, Value::Text(text)) => {
            date::parse_timestamp(&text).map(Value::Timestamp)
        }
        (FieldKind::Date, Value::Text(text)) => date::parse_date(&text).map(Value::Date),
        #[expect(clippy::cast_precision_loss)]
        (FieldKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (FieldKind::Float, Value::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| cannot_coerce(&text, kind)),
        (FieldKind::Int, Value::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| cannot_coerce(&text, kind)),

        (_, value) => Ok(value),
    }
}

// Relationship elements may resolve against the target's registered store.
fn coerce_element(kind: &FieldKind, item: Value, opts: Options) -> Result<Value, Error> {
    if opts.resolve_existing
        && let (Some(target), Value::Map(_)) = (kind.entity_target(), &item)
        && let Some(existing) = super::resolve_existing(target, &item, opts)?
    {
        return Ok(Value::from(existing));
    }

    coerce_with(kind, item, opts)
}

fn cannot_coerce(text: &str, kind: &FieldKind) -> Error {
    Error::type_mismatch(
        ErrorOrigin::Transform,
        format!("cannot coerce '{text}' to {kind}"),
    )
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorClass, test_fixtures::INNER_KIND};
    use time::macros::{date, datetime};

    static TEXT: FieldKind = FieldKind::Text;
    static INT: FieldKind = FieldKind::Int;
    static FLOAT: FieldKind = FieldKind::Float;
    static UUID_KIND: FieldKind = FieldKind::Uuid;

    #[test]
    fn scalar_rules() {
        assert_eq!(coerce(&FLOAT, Value::Int(2)).unwrap(), Value::Float(2.0));
        assert_eq!(coerce(&FLOAT, Value::from("2.5")).unwrap(), Value::Float(2.5));
        assert_eq!(coerce(&INT, Value::from(" 42 ")).unwrap(), Value::Int(42));
        assert_eq!(
            coerce(&FieldKind::Timestamp, Value::from("2024-02-03T04:05:06")).unwrap(),
            Value::Timestamp(datetime!(2024-02-03 04:05:06 UTC))
        );
        assert_eq!(
            coerce(&FieldKind::Date, Value::from("2024-02-03")).unwrap(),
            Value::Date(date!(2024 - 02 - 03))
        );

        let id = Uuid::new_v4();
        assert_eq!(
            coerce(&UUID_KIND, Value::Text(id.to_string())).unwrap(),
            Value::Uuid(id)
        );
    }

    #[test]
    fn unconvertible_text_fails() {
        let err = coerce(&INT, Value::from("abc")).unwrap_err();
        assert_eq!(err.class, ErrorClass::TypeMismatch);

        let err = coerce(&UUID_KIND, Value::from("abc")).unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidUuid);
    }

    #[test]
    fn no_rule_passes_through() {
        assert_eq!(coerce(&INT, Value::Float(1.5)).unwrap(), Value::Float(1.5));
        assert_eq!(coerce(&TEXT, Value::Int(1)).unwrap(), Value::Int(1));
        assert_eq!(coerce(&INNER_KIND, Value::Int(1)).unwrap(), Value::Int(1));
    }

    #[test]
    fn containers_coerce_element_wise() {
        let list = FieldKind::List(&FLOAT);
        assert_eq!(
            coerce(&list, Value::from_list(vec![1i64, 2])).unwrap(),
            Value::List(vec![Value::Float(1.0), Value::Float(2.0)])
        );

        let map = FieldKind::Map {
            key: &TEXT,
            value: &INT,
        };
        assert_eq!(
            coerce(&map, Value::record([("a", "1")])).unwrap(),
            Value::record([("a", 1i64)])
        );

        let opt = FieldKind::Optional(&INT);
        assert_eq!(coerce(&opt, Value::Null).unwrap(), Value::Null);
        assert_eq!(coerce(&opt, Value::from("7")).unwrap(), Value::Int(7));
    }

    #[test]
    fn nested_mappings_build_entities() {
        let built = coerce(&INNER_KIND, Value::record([("name", "n")])).unwrap();
        let entity = built.as_entity().unwrap();

        assert_eq!(entity.entity_name(), "Inner");
        assert_eq!(entity.get_text("name"), Some("n"));
    }
}
