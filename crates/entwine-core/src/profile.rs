//! Import profiles for external records.
//!
//! A [`Profile`] renames the keys of a record from an outside source into
//! the field names of one model, then builds it through the transformer.
//! Keys named in the field mapping are renamed explicitly; every other key
//! is converted from camelCase. Keys the model does not declare are dropped,
//! and nested records are remapped with the nested profile registered for
//! their field, or with a plain profile of the target model.

use crate::{
    db::{REMOTE_ID, Store},
    entity::Entity,
    error::{Error, ErrorOrigin},
    model::EntityModel,
    transform::Transformer,
    value::Value,
};
use convert_case::{Case, Casing};

///
/// Profile
///

#[derive(Clone, Copy, Debug)]
pub struct Profile {
    pub model: &'static EntityModel,
    /// `(external key, field name)` pairs.
    pub field_mapping: &'static [(&'static str, &'static str)],
    /// External key carrying the source's identifier; empty when none.
    pub external_pk_field: &'static str,
    /// External keys never imported.
    pub skip: &'static [&'static str],
    /// `(field name, profile)` pairs for nested records.
    pub nested: &'static [(&'static str, &'static Profile)],
    /// Scalar fields sent as `{value_key: x}` import `x`; empty when none.
    pub value_key: &'static str,
}

impl Profile {
    #[must_use]
    pub const fn new(model: &'static EntityModel) -> Self {
        Self {
            model,
            field_mapping: &[],
            external_pk_field: "",
            skip: &[],
            nested: &[],
            value_key: "",
        }
    }

    #[must_use]
    pub const fn with_mapping(mut self, field_mapping: &'static [(&'static str, &'static str)]) -> Self {
        self.field_mapping = field_mapping;
        self
    }

    #[must_use]
    pub const fn with_external_pk(mut self, external_pk_field: &'static str) -> Self {
        self.external_pk_field = external_pk_field;
        self
    }

    #[must_use]
    pub const fn skipping(mut self, skip: &'static [&'static str]) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub const fn with_nested(mut self, nested: &'static [(&'static str, &'static Self)]) -> Self {
        self.nested = nested;
        self
    }

    #[must_use]
    pub const fn unwrapping(mut self, value_key: &'static str) -> Self {
        self.value_key = value_key;
        self
    }

    /// Field name an external key maps to.
    #[must_use]
    pub fn field_name(&self, external: &str) -> String {
        self.field_mapping
            .iter()
            .find(|(from, _)| *from == external)
            .map_or_else(|| external.to_case(Case::Snake), |(_, to)| (*to).to_string())
    }

    /// Field the external identifier lands in, when the profile names one.
    #[must_use]
    pub fn remote_field(&self) -> Option<String> {
        (!self.external_pk_field.is_empty()).then(|| self.field_name(self.external_pk_field))
    }

    ///
    /// IMPORT
    ///

    /// Rename an external record into a mapping of this profile's model.
    pub fn remap(&self, data: &Value) -> Result<Value, Error> {
        let Some(entries) = data.as_map() else {
            return Err(Error::type_mismatch(
                ErrorOrigin::Transform,
                format!(
                    "{} profile cannot import from {}",
                    self.model.entity_name,
                    data.type_name()
                ),
            ));
        };

        let mut mapped = Value::Map(Vec::with_capacity(entries.len()));
        for (key, value) in entries {
            let Some(key) = key.as_text() else {
                continue;
            };
            if self.skip.contains(&key) {
                continue;
            }

            let name = self.field_name(key);
            let Some(field) = self.model.field(&name) else {
                tracing::trace!(entity = self.model.entity_name, key, "dropping undeclared key");
                continue;
            };

            let target = field
                .kind
                .relation_target()
                .or_else(|| field.kind.entity_target());
            let value = match target {
                Some(target) => self.nested_profile(field.name, target).remap_nested(value)?,
                None => self.scalar(value),
            };
            mapped.map_insert(field.name, value);
        }

        Ok(mapped)
    }

    /// Build an entity from an external record.
    pub fn from_external_data(&self, data: &Value) -> Result<Entity, Error> {
        let mapped = self.remap(data)?;
        let mut transformer = Transformer::for_model(self.model);
        transformer.import(mapped)?;

        transformer.into_entity()
    }

    /// Import into `store`: a record whose external identifier is already
    /// stored is patched, anything else is inserted.
    pub fn import(&self, store: &dyn Store, data: &Value) -> Result<Entity, Error> {
        let mapped = self.remap(data)?;

        let existing = match self.remote_field() {
            Some(field) => match mapped.map_get(&field) {
                Some(id) if !id.is_null() => store.get_by_field(&field, id)?,
                _ => None,
            },
            None => None,
        };

        match existing.as_ref().and_then(Entity::pk) {
            Some(pk) => {
                tracing::debug!(entity = self.model.entity_name, pk, "import matched a stored record");
                store.patch_dict(pk, &mapped)
            }
            None => {
                let entity = store.from_dict(&mapped)?;
                store.insert(entity)
            }
        }
    }

    /// Stored record carrying the given external identifier.
    pub fn load_by_external_id(&self, store: &dyn Store, id: &Value) -> Result<Option<Entity>, Error> {
        let field = self.remote_field().unwrap_or_else(|| REMOTE_ID.to_string());

        store.get_by_field(&field, id)
    }

    // nested records: one mapping, or a list of them
    fn remap_nested(&self, value: &Value) -> Result<Value, Error> {
        match value {
            Value::Map(_) => self.remap(value),
            Value::List(items) => items
                .iter()
                .map(|item| if item.is_map() { self.remap(item) } else { Ok(item.clone()) })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Ok(other.clone()),
        }
    }

    fn scalar(&self, value: &Value) -> Value {
        if !self.value_key.is_empty()
            && let Some(inner) = value.map_get(self.value_key)
        {
            return inner.clone();
        }

        value.clone()
    }

    fn nested_profile(&self, field: &str, target: &'static EntityModel) -> Self {
        self.nested
            .iter()
            .find(|(name, _)| *name == field)
            .map_or_else(|| Self::new(target), |(_, profile)| **profile)
    }
}

///
/// TESTS
///
