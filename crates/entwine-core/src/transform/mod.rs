//! Bidirectional entity-graph transformer.
//!
//! Build mode turns a mapping (or JSON object) into a fresh entity graph;
//! patch mode merges a mapping into an existing graph in place, preserving
//! untouched fields and nested identity. Export flattens back to a mapping
//! or JSON text.

mod coerce;

#[cfg(test)]
mod tests;

use crate::{
    entity::Entity,
    error::{Error, ErrorOrigin},
    model::EntityModel,
    obs::sink::{self, MetricsEvent, TransformMode},
    types::uuid::{self, UuidOptions},
    value::Value,
};

// re-exports
pub use coerce::coerce;

///
/// Source
/// Anything a transformer can import from.
///

#[derive(Clone, Debug)]
pub enum Source {
    Entity(Entity),
    Json(String),
    Value(Value),
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::Json(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::Json(text)
    }
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&Value> for Source {
    fn from(value: &Value) -> Self {
        Self::Value(value.clone())
    }
}

impl From<serde_json::Value> for Source {
    fn from(json: serde_json::Value) -> Self {
        Self::Value(Value::from(json))
    }
}

impl From<Entity> for Source {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

///
/// Options
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct Options {
    /// Relationship elements whose key is already stored are patched from
    /// the stored record instead of built fresh.
    pub resolve_existing: bool,
    /// Applied to every primary key present in imported data.
    pub keys: UuidOptions,
}

impl Options {
    pub const DEFAULT: Self = Self {
        resolve_existing: false,
        keys: UuidOptions::DEFAULT,
    };
}

impl Default for Options {
    fn default() -> Self {
        Self::DEFAULT
    }
}

///
/// Transformer
///
/// Session over one target model. Holds no instance in build mode until the
/// first import; holds the wrapped instance in patch mode.
///

#[derive(Clone, Debug)]
pub struct Transformer {
    model: &'static EntityModel,
    data: Option<Entity>,
    opts: Options,
}

impl Transformer {
    /// Build-mode session for a model.
    #[must_use]
    pub const fn for_model(model: &'static EntityModel) -> Self {
        Self {
            model,
            data: None,
            opts: Options::DEFAULT,
        }
    }

    /// Patch-mode session over an existing entity.
    #[must_use]
    pub fn for_entity(entity: Entity) -> Self {
        Self {
            model: entity.model(),
            data: Some(entity),
            opts: Options::default(),
        }
    }

    /// Resolve relationship elements against their registered stores.
    #[must_use]
    pub const fn resolve_existing(mut self, enabled: bool) -> Self {
        self.opts.resolve_existing = enabled;
        self
    }

    /// Switches for primary keys found in imported data. Keys absent from
    /// the data are left to the model default.
    #[must_use]
    pub const fn uuid_options(mut self, keys: UuidOptions) -> Self {
        self.opts.keys = keys;
        self
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    ///
    /// IMPORT
    ///

    /// Import a mapping, JSON object text or entity.
    ///
    /// Builds on the first import in build mode; patches thereafter.
    pub fn import(&mut self, source: impl Into<Source>) -> Result<&mut Self, Error> {
        let mapping = match source.into() {
            Source::Json(text) => {
                let json: serde_json::Value = serde_json::from_str(&text)?;
                Value::from(json)
            }
            Source::Value(value) => value,
            Source::Entity(entity) => entity.to_map(),
        };

        if !mapping.is_map() {
            return Err(Error::type_mismatch(
                ErrorOrigin::Transform,
                format!("cannot import from {}", mapping.type_name()),
            ));
        }

        match self.data.as_mut() {
            None => self.data = Some(build(self.model, &mapping, self.opts)?),
            Some(entity) => patch(entity, &mapping, self.opts)?,
        }

        Ok(self)
    }

    ///
    /// EXPORT
    ///

    #[must_use]
    pub const fn entity(&self) -> Option<&Entity> {
        self.data.as_ref()
    }

    pub fn into_entity(self) -> Result<Entity, Error> {
        let entity_name = self.model.entity_name;
        self.data.ok_or_else(|| no_instance(entity_name))
    }

    /// Flatten the held instance into a text-keyed map.
    pub fn as_dict(&self) -> Result<Value, Error> {
        self.data
            .as_ref()
            .map(Entity::to_map)
            .ok_or_else(|| no_instance(self.model.entity_name))
    }

    /// Serialize the held instance as a JSON object.
    pub fn as_json(&self) -> Result<String, Error> {
        let dict = self.as_dict()?;

        Ok(serde_json::to_string(&dict)?)
    }
}

fn no_instance(entity_name: &str) -> Error {
    Error::type_mismatch(
        ErrorOrigin::Transform,
        format!("transformer for {entity_name} holds no instance"),
    )
}

///
/// BUILD / PATCH
///

/// Build a fresh entity from the declared fields present in `mapping`.
pub(crate) fn build(
    model: &'static EntityModel,
    mapping: &Value,
    opts: Options,
) -> Result<Entity, Error> {
    let mut fields = Vec::with_capacity(model.fields.len());
    for field in model.fields {
        if let Some(value) = mapping.map_get(field.name) {
            let value = if field.name == model.primary_key {
                import_key(value, opts)?
            } else {
                coerce::coerce_with(&field.kind, value.clone(), opts)?
            };
            fields.push((field.name, value));
        }
    }

    sink::record(MetricsEvent::Transform {
        mode: TransformMode::Build,
        entity: model.entity_name,
    });
    tracing::trace!(entity = model.entity_name, fields = fields.len(), "build");

    Entity::from_fields(model, fields)
}

/// Merge `mapping` into `entity` in place.
///
/// - nested entity + mapping → recursive patch
/// - relationship + list → positional merge; the result has the incoming length
/// - otherwise → coerce and assign
pub(crate) fn patch(entity: &mut Entity, mapping: &Value, opts: Options) -> Result<(), Error> {
    let model = entity.model();

    for (index, field) in model.fields.iter().enumerate() {
        let Some(incoming) = mapping.map_get(field.name) else {
            continue;
        };

        if let (Value::Entity(current), Value::Map(_)) = (entity.value_mut(index), incoming) {
            patch(current, incoming, opts)?;
            continue;
        }

        if let (Some(target), Value::List(items)) = (field.kind.relation_target(), incoming) {
            let current = match entity.value_mut(index) {
                Value::List(current) => current.clone(),
                _ => Vec::new(),
            };
            let merged = merge_positional(target, current, items, opts)?;
            entity.set_index(index, Value::List(merged));
            continue;
        }

        let value = if field.name == model.primary_key {
            import_key(incoming, opts)?
        } else {
            coerce::coerce_with(&field.kind, incoming.clone(), opts)?
        };
        entity.set(field.name, value)?;
    }

    sink::record(MetricsEvent::Transform {
        mode: TransformMode::Patch,
        entity: model.entity_name,
    });
    tracing::trace!(entity = model.entity_name, pk = ?entity.pk(), "patch");

    if model.skip_validation {
        Ok(())
    } else {
        entity.validate_types()
    }
}

// Imported keys go through the session's switches; a swallowed failure
// leaves the key absent.
fn import_key(value: &Value, opts: Options) -> Result<Value, Error> {
    Ok(match uuid::normalize(value, opts.keys)? {
        Some(pk) => Value::Text(pk),
        None => Value::Null,
    })
}

// Index-aligned merge: element i of the incoming list patches element i of
// the current list when present, otherwise builds a new element. Current
// elements past the incoming length are dropped.
fn merge_positional(
    target: &'static EntityModel,
    current: Vec<Value>,
    incoming: &[Value],
    opts: Options,
) -> Result<Vec<Value>, Error> {
    let mut existing = current.into_iter();
    let mut merged = Vec::with_capacity(incoming.len());

    for item in incoming {
        let item = match item {
            Value::Entity(entity) => entity.to_map(),
            other => other.clone(),
        };

        match existing.next() {
            Some(Value::Entity(mut element)) if item.is_map() => {
                patch(&mut element, &item, opts)?;
                merged.push(Value::Entity(element));
            }
            _ if item.is_map() => {
                let element = match resolve_existing(target, &item, opts)? {
                    Some(element) => element,
                    None => build(target, &item, opts)?,
                };
                merged.push(Value::from(element));
            }
            _ => merged.push(item),
        }
    }

    Ok(merged)
}

/// Look up a relationship element by the key carried in its mapping and,
/// when the target's store already holds it, patch the stored copy.
pub(crate) fn resolve_existing(
    target: &'static EntityModel,
    mapping: &Value,
    opts: Options,
) -> Result<Option<Entity>, Error> {
    if !opts.resolve_existing {
        return Ok(None);
    }

    let Some(pk) = mapping
        .map_get(target.primary_key)
        .and_then(Value::as_text)
        .and_then(uuid::canonical)
    else {
        return Ok(None);
    };
    let Some(store) = target.store() else {
        return Ok(None);
    };
    let Some(mut existing) = store.get(&pk)? else {
        return Ok(None);
    };

    tracing::debug!(entity = target.entity_name, pk = %pk, "resolved existing relationship element");
    patch(&mut existing, mapping, opts)?;

    Ok(Some(existing))
}
