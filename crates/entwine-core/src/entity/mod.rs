pub mod matcher;
mod validate;


use crate::{
    error::{Error, ErrorOrigin},
    model::EntityModel,
    types::uuid::{self, UuidOptions},
    value::Value,
};
use std::{
    fmt,
    hash::{Hash, Hasher},
};

// re-exports
pub use matcher::matches;

///
/// Entity
///
/// A typed domain record: one value slot per declared field of its model.
///
/// Identity is the model plus the primary key; two entities with the same
/// key compare equal even when other fields differ. Use [`Entity::same_fields`]
/// for structural comparison.
///

#[derive(Clone)]
pub struct Entity {
    model: &'static EntityModel,
    values: Vec<Value>,
}

impl Entity {
    ///
    /// CONSTRUCTION
    ///

    /// Construct an entity with every field at its default.
    pub fn new(model: &'static EntityModel) -> Result<Self, Error> {
        Self::from_fields(model, std::iter::empty::<(&str, Value)>())
    }

    /// Construct an entity from named field values.
    ///
    /// Unknown names and missing required fields are type mismatches.
    /// The primary key is normalized; the result is validated unless the
    /// model opts out.
    pub fn from_fields<K, V, I>(model: &'static EntityModel, fields: I) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut slots: Vec<Option<Value>> = vec![None; model.fields.len()];

        for (name, value) in fields {
            let name = name.as_ref();
            let index = model.field_index(name).ok_or_else(|| {
                Error::type_mismatch(
                    ErrorOrigin::Validate,
                    format!("{} has no field '{name}'", model.entity_name),
                )
            })?;
            slots[index] = Some(value.into());
        }

        let mut values = Vec::with_capacity(slots.len());
        for (field, slot) in model.fields.iter().zip(slots) {
            let value = match slot.or_else(|| field.default.to_value()) {
                Some(value) => value,
                None => {
                    return Err(Error::type_mismatch(
                        ErrorOrigin::Validate,
                        format!(
                            "{} missing required field '{}'",
                            model.entity_name, field.name
                        ),
                    ));
                }
            };
            values.push(value);
        }

        let mut entity = Self { model, values };
        if let Some(index) = model.pk_index() {
            let raw = std::mem::replace(&mut entity.values[index], Value::Null);
            entity.values[index] = normalize_pk(&raw)?;
        }

        if !model.skip_validation {
            entity.validate_types()?;
        }

        Ok(entity)
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        self.model.entity_name
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.model.field_index(name).map(|i| &self.values[i])
    }

    /// Iterate `(field name, value)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.model.field_names().zip(self.values.iter())
    }

    /// Set one field.
    ///
    /// Assigning the primary key always goes through UUID normalization.
    /// Other fields are stored as given; call [`Entity::validate_types`] to
    /// re-check them.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let index = self.model.field_index(name).ok_or_else(|| {
            Error::type_mismatch(
                ErrorOrigin::Validate,
                format!("{} has no field '{name}'", self.model.entity_name),
            )
        })?;

        let value = value.into();
        self.values[index] = if name == self.model.primary_key {
            normalize_pk(&value)?
        } else {
            value
        };

        Ok(())
    }

    ///
    /// PRIMARY KEY
    ///

    /// Canonical primary key, or `None` when absent or empty.
    #[must_use]
    pub fn pk(&self) -> Option<&str> {
        self.get(self.model.primary_key)
            .and_then(Value::as_text)
            .filter(|pk| !pk.is_empty())
    }

    pub fn set_pk(&mut self, pk: impl Into<Value>) -> Result<(), Error> {
        let primary_key = self.model.primary_key;
        self.set(primary_key, pk)
    }

    /// Reset the primary key to absent.
    pub fn clear_pk(&mut self) {
        if let Some(index) = self.model.pk_index() {
            self.values[index] = Value::Null;
        }
    }

    ///
    /// TYPED ACCESSORS
    ///

    #[must_use]
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_entity(&self, name: &str) -> Option<&Self> {
        self.get(name).and_then(Value::as_entity)
    }

    /// Entities held by a relationship (or entity-list) field.
    #[must_use]
    pub fn get_related(&self, name: &str) -> Vec<&Self> {
        self.get(name)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_entity).collect())
            .unwrap_or_default()
    }

    ///
    /// EXPORT
    ///

    /// Recursively flatten into a text-keyed map.
    ///
    /// Nested entities become maps and relationship collections lists of
    /// maps; leaf values are left as they are.
    #[must_use]
    pub fn to_map(&self) -> Value {
        Value::Map(
            self.fields()
                .map(|(name, value)| (Value::Text(name.to_string()), flatten(value)))
                .collect(),
        )
    }

    /// Field-by-field comparison, recursing into nested entities.
    #[must_use]
    pub fn same_fields(&self, other: &Self) -> bool {
        self.model.is(other.model)
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.structural_eq(b))
    }

    pub(crate) fn value_mut(&mut self, index: usize) -> &mut Value {
        &mut self.values[index]
    }

    pub(crate) fn set_index(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }
}

// Normalize a primary-key value into its stored form:
// canonical text, empty text, or null.
fn normalize_pk(value: &Value) -> Result<Value, Error> {
    Ok(match uuid::normalize(value, UuidOptions::default())? {
        Some(pk) => Value::Text(pk),
        None => Value::Null,
    })
}

fn flatten(value: &Value) -> Value {
    match value {
        Value::Entity(entity) => entity.to_map(),
        Value::List(items) => Value::List(items.iter().map(flatten).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), flatten(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.model.is(other.model) && self.pk() == other.pk()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model.entity_name.hash(state);
        self.pk().hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.model.entity_name)?;
        f.debug_map().entries(self.fields()).finish()
    }
}
