//! JSON bridge for `Value`.
//!
//! UUID, date and timestamp leaves are emitted in their canonical string
//! form. Incoming JSON never produces those variants; field coercion turns
//! text into typed leaves where the model asks for them.

use crate::{types::date, value::Value};
use serde::{Serialize, Serializer, ser::SerializeMap, ser::SerializeSeq};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

impl Value {
    /// Convert into a `serde_json::Value` tree.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Date(d) => JsonValue::String(date::format_date(*d)),
            Self::Entity(entity) => {
                let object = entity
                    .fields()
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect::<JsonMap<_, _>>();

                JsonValue::Object(object)
            }
            Self::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::Int(i) => JsonValue::Number((*i).into()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (json_key(k), v.to_json()))
                    .collect(),
            ),
            Self::Null => JsonValue::Null,
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Timestamp(ts) => JsonValue::String(date::format_timestamp(*ts)),
            Self::Uuid(u) => JsonValue::String(u.hyphenated().to_string()),
        }
    }
}

// JSON object keys are strings; non-text keys use their display form.
fn json_key(key: &Value) -> String {
    match key {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            JsonValue::String(s) => Self::Text(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(object) => Self::Map(
                object
                    .into_iter()
                    .map(|(k, v)| (Self::Text(k), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Null => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&json_key(k), v)?;
                }
                map.end()
            }
            Self::Entity(entity) => {
                let mut map = serializer.serialize_map(Some(entity.model().fields.len()))?;
                for (name, value) in entity.fields() {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Self::Date(_) | Self::Timestamp(_) | Self::Uuid(_) => {
                serializer.serialize_str(&self.to_string())
            }
        }
    }
}
