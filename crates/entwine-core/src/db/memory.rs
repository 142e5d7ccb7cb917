//! In-memory store backend.
//!
//! A [`MemoryBackend`] holds one insertion-ordered partition per entity name,
//! so stores of different models can share a backend without sharing a
//! keyspace. Querying delegates to [`RecordFilter`].

use crate::{
    db::{Store, already_exists, check_model, lookup_key, merge_non_null, require_pk},
    entity::Entity,
    error::Error,
    filter::{Criteria, RecordFilter},
    model::EntityModel,
    obs::sink::{Span, StoreOp},
    types::uuid::{self, UuidOptions},
};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

///
/// Partition
///
/// Rows keyed by insertion sequence, plus a primary-key index into them.
/// Replacing a row keeps its position.
///

#[derive(Debug, Default)]
struct Partition {
    rows: BTreeMap<u64, Entity>,
    index: HashMap<String, u64>,
    next_seq: u64,
}

impl Partition {
    fn get(&self, pk: &str) -> Option<&Entity> {
        self.index.get(pk).and_then(|seq| self.rows.get(seq))
    }

    fn contains(&self, pk: &str) -> bool {
        self.index.contains_key(pk)
    }

    fn upsert(&mut self, pk: String, entity: Entity) {
        if let Some(seq) = self.index.get(&pk) {
            self.rows.insert(*seq, entity);
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.rows.insert(seq, entity);
            self.index.insert(pk, seq);
        }
    }

    fn remove(&mut self, pk: &str) -> Option<Entity> {
        let seq = self.index.remove(pk)?;
        self.rows.remove(&seq)
    }

    fn scan(&self) -> Vec<Entity> {
        self.rows.values().cloned().collect()
    }
}

///
/// MemoryBackend
/// Shareable handle to the partition map.
///

#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    partitions: Arc<RwLock<HashMap<&'static str, Partition>>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every row in every partition.
    pub fn clear(&self) {
        self.partitions.write().clear();
    }

    /// Drop every row of one entity.
    pub fn clear_partition(&self, entity_name: &str) {
        self.partitions.write().remove(entity_name);
    }

    /// Row count for one entity.
    #[must_use]
    pub fn len(&self, entity_name: &str) -> usize {
        self.partitions
            .read()
            .get(entity_name)
            .map_or(0, |p| p.rows.len())
    }

    fn read<R>(&self, entity_name: &str, f: impl FnOnce(Option<&Partition>) -> R) -> R {
        f(self.partitions.read().get(entity_name))
    }

    fn write<R>(&self, entity_name: &'static str, f: impl FnOnce(&mut Partition) -> R) -> R {
        f(self.partitions.write().entry(entity_name).or_default())
    }
}

///
/// MemoryStore
///

#[derive(Clone, Debug)]
pub struct MemoryStore {
    model: &'static EntityModel,
    backend: MemoryBackend,
    keys: UuidOptions,
}

impl MemoryStore {
    /// Store over a private backend.
    #[must_use]
    pub fn new(model: &'static EntityModel) -> Self {
        Self::with_backend(model, MemoryBackend::new())
    }

    /// Store over a shared backend.
    #[must_use]
    pub const fn with_backend(model: &'static EntityModel, backend: MemoryBackend) -> Self {
        Self {
            model,
            backend,
            keys: UuidOptions::DEFAULT,
        }
    }

    /// Primary-key switches for imported mappings.
    #[must_use]
    pub const fn with_uuid_options(mut self, keys: UuidOptions) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub const fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    const fn entity_name(&self) -> &'static str {
        self.model.entity_name
    }
}

impl Store for MemoryStore {
    fn model(&self) -> &'static EntityModel {
        self.model
    }

    fn uuid_options(&self) -> UuidOptions {
        self.keys
    }

    fn get(&self, pk: &str) -> Result<Option<Entity>, Error> {
        let mut span = Span::new(StoreOp::Get, self.entity_name());
        let pk = lookup_key(pk);
        let found = self
            .backend
            .read(self.entity_name(), |p| p.and_then(|p| p.get(&pk)).cloned());
        span.set_rows(usize::from(found.is_some()));

        Ok(found)
    }

    fn scan(&self) -> Result<Vec<Entity>, Error> {
        let mut span = Span::new(StoreOp::Scan, self.entity_name());
        let rows = self
            .backend
            .read(self.entity_name(), |p| p.map(Partition::scan).unwrap_or_default());
        span.set_rows(rows.len());

        Ok(rows)
    }

    fn filter(&self, criteria: &Criteria) -> Result<Vec<Entity>, Error> {
        let mut span = Span::new(StoreOp::Filter, self.entity_name());
        criteria.compile_for(self.model)?;

        let rows = self
            .backend
            .read(self.entity_name(), |p| p.map(Partition::scan).unwrap_or_default());
        if rows.is_empty() {
            return Ok(rows);
        }

        let mut filter = RecordFilter::new(rows)?;
        filter.filter(criteria)?;
        let rows = filter.into_results();
        span.set_rows(rows.len());

        tracing::debug!(entity = self.entity_name(), criteria = %criteria, rows = rows.len(), "memory filter");

        Ok(rows)
    }

    fn insert(&self, mut entity: Entity) -> Result<Entity, Error> {
        check_model(self.model, &entity)?;
        let mut span = Span::new(StoreOp::Insert, self.entity_name());

        let pk = match entity.pk() {
            Some(pk) => pk.to_string(),
            None => {
                let pk = uuid::generate();
                entity.set_pk(pk.as_str())?;
                pk
            }
        };

        self.backend.write(self.entity_name(), |p| {
            if p.contains(&pk) {
                return Err(already_exists(self.entity_name(), &pk));
            }
            p.upsert(pk.clone(), entity.clone());
            Ok(())
        })?;
        span.set_rows(1);

        tracing::debug!(entity = self.entity_name(), pk = %pk, "memory insert");

        Ok(entity)
    }

    fn update(&self, entity: Entity) -> Result<Entity, Error> {
        check_model(self.model, &entity)?;
        let mut span = Span::new(StoreOp::Update, self.entity_name());
        let pk = require_pk(&entity, "update")?.to_string();

        self.backend.write(self.entity_name(), |p| {
            if !p.contains(&pk) {
                return Err(Error::not_found(self.entity_name(), &pk));
            }
            p.upsert(pk.clone(), entity.clone());
            Ok(())
        })?;
        span.set_rows(1);

        Ok(entity)
    }

    fn patch(&self, entity: Entity) -> Result<Entity, Error> {
        check_model(self.model, &entity)?;
        let mut span = Span::new(StoreOp::Patch, self.entity_name());
        let pk = require_pk(&entity, "patch")?.to_string();

        let merged = self.backend.write(self.entity_name(), |p| {
            let merged = match p.get(&pk) {
                Some(existing) => {
                    let mut merged = existing.clone();
                    merge_non_null(&mut merged, &entity)?;
                    merged
                }
                None => entity,
            };
            p.upsert(pk.clone(), merged.clone());

            Ok::<_, Error>(merged)
        })?;
        span.set_rows(1);

        Ok(merged)
    }

    fn delete(&self, pk: &str) -> Result<(), Error> {
        let mut span = Span::new(StoreOp::Delete, self.entity_name());
        let pk = lookup_key(pk);

        self.backend
            .write(self.entity_name(), |p| p.remove(&pk))
            .ok_or_else(|| Error::not_found(self.entity_name(), &pk))?;
        span.set_rows(1);

        Ok(())
    }
}
