//! Value ↔ SQLite conversion and filter translation.

use crate::{
    db::sqlite::schema::{Column, Storage, TableSchema, quote},
    error::Error,
    filter::{Criteria, Suffix},
    model::FieldKind,
    types::date,
    value::Value,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use time::{OffsetDateTime, UtcOffset, macros::format_description};

/// Fixed-width UTC text, so text order is time order.
pub(crate) fn format_stored_timestamp(ts: OffsetDateTime) -> Result<String, Error> {
    ts.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        ))
        .map_err(|err| Error::backend(format!("cannot format timestamp: {err}")))
}

/// Unix nanoseconds for the row timestamp columns.
pub(crate) fn now_nanos() -> i64 {
    i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos()).unwrap_or(i64::MAX)
}

pub(crate) fn from_nanos(nanos: i64) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|err| Error::backend(format!("bad row timestamp {nanos}: {err}")))
}

///
/// ENCODE
///

/// Encode a value for a column of the given storage.
pub(crate) fn to_sql(storage: Storage, value: &Value) -> Result<SqlValue, Error> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    if storage == Storage::Json {
        return Ok(SqlValue::Text(serde_json::to_string(&value.to_json())?));
    }

    Ok(match value {
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Uuid(u) => SqlValue::Text(u.hyphenated().to_string()),
        Value::Date(d) => SqlValue::Text(date::format_date(*d)),
        Value::Timestamp(ts) => SqlValue::Text(format_stored_timestamp(*ts)?),
        Value::Entity(_) | Value::List(_) | Value::Map(_) => {
            SqlValue::Text(serde_json::to_string(&value.to_json())?)
        }
        Value::Null => SqlValue::Null,
    })
}

///
/// DECODE
///

/// Decode one column; typed leaves are left as text for field coercion.
pub(crate) fn from_sql(column: &Column, raw: ValueRef<'_>) -> Result<Value, Error> {
    Ok(match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if column.storage == Storage::Bool => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|err| {
                Error::backend(format!("column '{}' is not utf-8: {err}", column.name))
            })?;

            if column.storage == Storage::Json {
                Value::from(serde_json::from_str::<serde_json::Value>(text)?)
            } else {
                Value::Text(text.to_string())
            }
        }
        ValueRef::Blob(_) => {
            return Err(Error::backend(format!(
                "unexpected blob in column '{}'",
                column.name
            )));
        }
    })
}

///
/// FILTER
///

///
/// SqlFilter
/// `WHERE` body plus its positional parameters.
///

#[derive(Debug, Default)]
pub(crate) struct SqlFilter {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

/// Translate criteria into a `WHERE` body. Relationship fields are skipped.
pub(crate) fn build_filter(schema: &TableSchema, criteria: &Criteria) -> Result<SqlFilter, Error> {
    let mut parts = Vec::new();
    let mut params = Vec::new();

    for clause in criteria.compile_for(schema.model)? {
        if schema.link(&clause.attr).is_some() {
            continue;
        }

        let (col, storage, kind) = if clause.attr == schema.pk {
            (quote(schema.pk), Storage::Text, &FieldKind::Text)
        } else {
            let column = schema.column(&clause.attr).ok_or_else(|| {
                Error::invalid_query(format!("'{}' is not a filterable column", clause.attr))
            })?;
            (quote(column.name), column.storage, column.kind)
        };
        let value = &clause.value;

        let part = match clause.suffix {
            None if equatable(kind, value) => {
                params.push(to_sql(storage, value)?);
                format!("{col} IS ?")
            }
            None => "0".to_string(),
            Some(Suffix::Neq) if equatable(kind, value) => {
                params.push(to_sql(storage, value)?);
                format!("{col} IS NOT ?")
            }
            Some(Suffix::Neq) => "1".to_string(),
            Some(op @ (Suffix::Gte | Suffix::Lte)) => {
                if orderable(kind, value) {
                    params.push(to_sql(storage, value)?);
                    let sym = if op == Suffix::Gte { ">=" } else { "<=" };
                    format!("{col} {sym} ?")
                } else {
                    "0".to_string()
                }
            }
            Some(op @ (Suffix::In | Suffix::NotIn)) => {
                let negate = op == Suffix::NotIn;
                match value {
                    Value::List(items) => {
                        let with_null = items.iter().any(Value::is_null);
                        let items: Vec<_> = items
                            .iter()
                            .filter(|item| !item.is_null() && equatable(kind, item))
                            .collect();
                        for item in &items {
                            params.push(to_sql(storage, item)?);
                        }
                        let marks = vec!["?"; items.len()].join(", ");

                        match (negate, with_null, items.is_empty()) {
                            (false, false, true) => "0".to_string(),
                            (false, true, true) => format!("{col} IS NULL"),
                            (false, false, false) => format!("{col} IN ({marks})"),
                            (false, true, false) => format!("({col} IS NULL OR {col} IN ({marks}))"),
                            (true, false, true) => "1".to_string(),
                            (true, true, true) => format!("{col} IS NOT NULL"),
                            (true, false, false) => {
                                format!("({col} IS NULL OR {col} NOT IN ({marks}))")
                            }
                            (true, true, false) => {
                                format!("({col} IS NOT NULL AND {col} NOT IN ({marks}))")
                            }
                        }
                    }
                    _ if !holds_text(kind) => String::from(if negate { "1" } else { "0" }),
                    _ => {
                        params.push(to_sql(Storage::Text, value)?);
                        if negate {
                            format!("({col} IS NULL OR instr(?, {col}) = 0)")
                        } else {
                            format!("instr(?, {col}) > 0")
                        }
                    }
                }
            }
            Some(op @ (Suffix::Contains | Suffix::NContains)) => {
                let negate = op == Suffix::NContains;
                contains_clause(&col, storage, kind, value, negate, &mut params)?
            }
        };

        parts.push(part);
    }

    Ok(SqlFilter {
        clause: if parts.is_empty() {
            "1".to_string()
        } else {
            parts.join(" AND ")
        },
        params,
    })
}

// Substring on text, element membership on JSON lists, key membership on
// JSON maps; anything else never matches.
fn contains_clause(
    col: &str,
    storage: Storage,
    kind: &FieldKind,
    value: &Value,
    negate: bool,
    params: &mut Vec<SqlValue>,
) -> Result<String, Error> {
    let not = if negate { "NOT " } else { "" };

    Ok(match (storage, kind.unwrap_optional()) {
        (Storage::Text, _) if holds_text(kind) && matches!(value, Value::Text(_)) => {
            params.push(to_sql(Storage::Text, value)?);
            let cmp = if negate { "= 0" } else { "> 0" };
            format!("instr({col}, ?) {cmp}")
        }
        (Storage::Json, FieldKind::List(_)) => {
            params.push(to_sql(Storage::Text, value)?);
            format!("({col} IS NOT NULL AND {not}EXISTS (SELECT 1 FROM json_each({col}) WHERE value = ?))")
        }
        (Storage::Json, FieldKind::Map { .. }) => {
            params.push(to_sql(Storage::Text, value)?);
            format!("({col} IS NOT NULL AND {not}EXISTS (SELECT 1 FROM json_each({col}) WHERE key = ?))")
        }
        _ => "0".to_string(),
    })
}

// Built entities hold typed leaves, so a criterion only meets a column
// through the variant its field kind produces.
const fn orderable(kind: &FieldKind, value: &Value) -> bool {
    matches!(
        (kind.unwrap_optional(), value),
        (FieldKind::Bool, Value::Bool(_))
            | (FieldKind::Int, Value::Int(_))
            | (FieldKind::Float, Value::Float(_))
            | (FieldKind::Text | FieldKind::UuidStr, Value::Text(_))
            | (FieldKind::Uuid, Value::Uuid(_))
            | (FieldKind::Date, Value::Date(_))
            | (FieldKind::Timestamp, Value::Timestamp(_))
    )
}

// Equality also meets null, crosses int/float, and compares JSON columns
// by their encoded text.
const fn equatable(kind: &FieldKind, value: &Value) -> bool {
    value.is_null()
        || orderable(kind, value)
        || matches!(Storage::for_kind(kind), Storage::Json)
        || matches!(
            (kind.unwrap_optional(), value),
            (FieldKind::Int | FieldKind::Float, Value::Int(_) | Value::Float(_))
        )
}

const fn holds_text(kind: &FieldKind) -> bool {
    matches!(kind.unwrap_optional(), FieldKind::Text | FieldKind::UuidStr)
}

///
/// TESTS
///
