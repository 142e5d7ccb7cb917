//! Filterable entity stores.
//!
//! One CRUD contract, [`Store`], implemented by an in-memory backend and a
//! SQLite backend. Both accept the same suffix filter grammar and share the
//! `put` write policy and the transformer conveniences provided here.

pub mod memory;
pub mod registry;
pub mod sqlite;


use crate::{
    entity::Entity,
    error::{Error, ErrorOrigin},
    filter::Criteria,
    model::EntityModel,
    obs::sink::{self, MetricsEvent},
    transform::Transformer,
    types::uuid::{self, UuidOptions},
    value::Value,
};

// re-exports
pub use memory::{MemoryBackend, MemoryStore};
pub use registry::{StoreRegistry, StoreRegistryError, register_store, store_for, unregister_store};
pub use sqlite::{EntityRow, SqliteStore};

/// Field holding the identifier assigned by an external source.
pub const REMOTE_ID: &str = "remote_id";

///
/// IntoEntity
/// Anything a store can flatten through the transformer.
///

pub trait IntoEntity {
    fn to_entity(&self) -> Result<Entity, Error>;
}

impl IntoEntity for Entity {
    fn to_entity(&self) -> Result<Entity, Error> {
        Ok(self.clone())
    }
}

///
/// Store
///
/// CRUD over one entity model. Backends implement the primitive operations;
/// `put`, `get_or_create` and the dict conveniences are shared.
///

pub trait Store: Send + Sync {
    fn model(&self) -> &'static EntityModel;

    /// Lookup by primary key; a missing key is `None`, never an error.
    fn get(&self, pk: &str) -> Result<Option<Entity>, Error>;

    /// Every record, in backend order.
    fn scan(&self) -> Result<Vec<Entity>, Error>;

    fn filter(&self, criteria: &Criteria) -> Result<Vec<Entity>, Error>;

    /// Store a new record, generating a key when the entity has none.
    fn insert(&self, entity: Entity) -> Result<Entity, Error>;

    /// Replace an existing record; `NotFound` when the key is not stored.
    fn update(&self, entity: Entity) -> Result<Entity, Error>;

    /// Merge the non-null fields of `entity` into the stored record, or
    /// store it under its key when absent.
    fn patch(&self, entity: Entity) -> Result<Entity, Error>;

    /// Remove a record; `NotFound` when the key is not stored.
    fn delete(&self, pk: &str) -> Result<(), Error>;

    /// Switches applied to primary keys in imported mappings.
    fn uuid_options(&self) -> UuidOptions {
        UuidOptions::DEFAULT
    }

    ///
    /// WRITE POLICY
    ///

    /// No key → insert; key → update, falling back to patch when the key
    /// is not stored yet.
    fn put(&self, entity: Entity) -> Result<Entity, Error> {
        let Some(pk) = entity.pk().map(str::to_string) else {
            return self.insert(entity);
        };

        match self.update(entity.clone()) {
            Err(err) if err.is_not_found() => {
                let entity_name = self.model().entity_name;
                tracing::warn!(entity = entity_name, pk = %pk, "put: update missed, patching");
                sink::record(MetricsEvent::PutFallback {
                    entity: entity_name,
                });

                self.patch(entity)
            }
            result => result,
        }
    }

    /// The single record whose `field` equals `value`; `AmbiguousMatch`
    /// when several do, `InvalidQuery` when the model has no such field.
    fn get_by_field(&self, field: &str, value: &Value) -> Result<Option<Entity>, Error> {
        let criteria = Criteria::new().with(field, value.clone());
        let mut matches = self.filter(&criteria)?;

        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            _ => Err(Error::ambiguous(self.model().entity_name, criteria)),
        }
    }

    /// Lookup by the identifier an external source assigned.
    fn get_by_remote_id(&self, remote_id: &Value) -> Result<Option<Entity>, Error> {
        self.get_by_field(REMOTE_ID, remote_id)
    }

    /// The single record matching `criteria`, created from the plain
    /// criteria fields when nothing matches.
    fn get_or_create(&self, criteria: &Criteria) -> Result<Entity, Error> {
        let mut matches = self.filter(criteria)?;

        match matches.len() {
            0 => {
                let data = Value::record(
                    criteria
                        .plain_fields()
                        .into_iter()
                        .map(|(k, v)| (k, v.clone())),
                );
                let mut entity = self.from_dict(&data)?;
                entity.clear_pk();

                self.insert(entity)
            }
            1 => Ok(matches.remove(0)),
            _ => Err(Error::ambiguous(self.model().entity_name, criteria)),
        }
    }

    ///
    /// CONVERSIONS
    ///

    /// Build an entity of this store's model from a mapping.
    ///
    /// Relationship elements carrying the key of a record held by their
    /// model's registered store are patched from that record.
    fn from_dict(&self, data: &Value) -> Result<Entity, Error> {
        let mut transformer = Transformer::for_model(self.model())
            .uuid_options(self.uuid_options())
            .resolve_existing(true);
        transformer.import(data)?;

        transformer.into_entity()
    }

    /// Export any entity-like object as a mapping, without private fields.
    fn to_dict(&self, obj: &dyn IntoEntity) -> Result<Value, Error> {
        let mut dict = Transformer::for_entity(obj.to_entity()?).as_dict()?;
        if let Value::Map(entries) = &mut dict {
            entries.retain(|(k, _)| !k.as_text().is_some_and(|k| k.starts_with('_')));
        }

        Ok(dict)
    }

    /// Deep partial update of a stored record through the transformer.
    fn patch_dict(&self, pk: &str, data: &Value) -> Result<Entity, Error> {
        let model = self.model();
        let pk = lookup_key(pk);
        let existing = self
            .get(&pk)?
            .ok_or_else(|| Error::not_found(model.entity_name, &pk))?;

        let mut transformer = Transformer::for_entity(existing)
            .uuid_options(self.uuid_options())
            .resolve_existing(true);
        transformer.import(data)?;
        let patched = transformer.into_entity()?;

        if patched.pk() != Some(pk.as_str()) {
            return Err(Error::malformed(
                ErrorOrigin::Store,
                format!("patch of {} '{pk}' cannot change its primary key", model.entity_name),
            ));
        }

        self.update(patched)
    }
}

///
/// SHARED HELPERS
///

// Reject entities of a different model.
pub(crate) fn check_model(model: &EntityModel, entity: &Entity) -> Result<(), Error> {
    if model.is(entity.model()) {
        Ok(())
    } else {
        Err(Error::type_mismatch(
            ErrorOrigin::Store,
            format!(
                "store for {} cannot hold {}",
                model.entity_name,
                entity.entity_name()
            ),
        ))
    }
}

pub(crate) fn require_pk<'a>(entity: &'a Entity, op: &str) -> Result<&'a str, Error> {
    entity.pk().ok_or_else(|| {
        Error::malformed(
            ErrorOrigin::Store,
            format!("cannot {op} {} without a primary key", entity.entity_name()),
        )
    })
}

// Lookups accept any UUID spelling of a stored key.
pub(crate) fn lookup_key(pk: &str) -> String {
    uuid::canonical(pk).unwrap_or_else(|| pk.to_string())
}

pub(crate) fn already_exists(entity: &str, pk: &str) -> Error {
    Error::malformed(
        ErrorOrigin::Store,
        format!("{entity} with primary key '{pk}' already exists"),
    )
}

/// Overlay the non-null fields of `incoming` onto `existing`.
pub(crate) fn merge_non_null(existing: &mut Entity, incoming: &Entity) -> Result<(), Error> {
    for (name, value) in incoming.fields() {
        if !value.is_null() {
            existing.set(name, value.clone())?;
        }
    }

    Ok(())
}
