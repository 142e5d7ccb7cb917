//! SQLite store backend.
//!
//! Rows are flattened per [`schema`]; relationship children live in their
//! own tables and are written before their parent, then linked by position.
//! Reads load children eagerly. Every call runs in its own transaction.

mod query;
mod schema;

#[cfg(test)]
mod tests;

use crate::{
    db::{IntoEntity, Store, already_exists, check_model, lookup_key, merge_non_null, require_pk},
    entity::Entity,
    error::{Error, ErrorOrigin},
    filter::Criteria,
    model::EntityModel,
    obs::sink::{Span, StoreOp},
    transform::{self, Options},
    types::uuid::{self, UuidOptions},
    value::Value,
};
use parking_lot::Mutex;
use query::{SqlFilter, from_nanos, from_sql, now_nanos, to_sql};
use rusqlite::{Connection, OptionalExtension, params_from_iter, types::Value as SqlValue};
use schema::{DATE_CREATED, DATE_UPDATED, TableSchema, quote};
use std::{path::Path, sync::Arc};
use time::OffsetDateTime;

///
/// EntityRow
///
/// One stored row with its bookkeeping columns. `values` holds the field
/// values keyed by field name, relationship children already loaded.
///

#[derive(Clone, Debug)]
pub struct EntityRow {
    model: &'static EntityModel,
    pub pk: String,
    pub date_created: OffsetDateTime,
    pub date_updated: OffsetDateTime,
    pub values: Value,
}

impl EntityRow {
    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }
}

impl IntoEntity for EntityRow {
    fn to_entity(&self) -> Result<Entity, Error> {
        transform::build(self.model, &self.values, Options::default())
    }
}

///
/// SqliteStore
///

#[derive(Clone)]
pub struct SqliteStore {
    schema: TableSchema,
    conn: Arc<Mutex<Connection>>,
    keys: UuidOptions,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>, model: &'static EntityModel) -> Result<Self, Error> {
        let conn = Connection::open(path)?;

        Self::with_connection(Arc::new(Mutex::new(conn)), model)
    }

    /// Private in-memory database.
    pub fn open_in_memory(model: &'static EntityModel) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;

        Self::with_connection(Arc::new(Mutex::new(conn)), model)
    }

    /// Store over an existing connection; creates missing tables.
    pub fn with_connection(
        conn: Arc<Mutex<Connection>>,
        model: &'static EntityModel,
    ) -> Result<Self, Error> {
        {
            let guard = conn.lock();
            guard.pragma_update(None, "foreign_keys", true)?;
            schema::ensure_schema(&guard, model)?;
        }

        Ok(Self {
            schema: TableSchema::for_model(model)?,
            conn,
            keys: UuidOptions::DEFAULT,
        })
    }

    /// Primary-key switches for imported mappings.
    #[must_use]
    pub fn with_uuid_options(mut self, keys: UuidOptions) -> Self {
        self.keys = keys;
        self
    }

    /// Store for another model on the same connection and key switches.
    pub fn sibling(&self, model: &'static EntityModel) -> Result<Self, Error> {
        Ok(Self::with_connection(Arc::clone(&self.conn), model)?.with_uuid_options(self.keys))
    }

    #[must_use]
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    const fn entity_name(&self) -> &'static str {
        self.schema.model.entity_name
    }

    /// Raw row by primary key.
    pub fn get_row(&self, pk: &str) -> Result<Option<EntityRow>, Error> {
        let pk = lookup_key(pk);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let row = load_row(&tx, &self.schema, &pk, &mut Vec::new())?;
        tx.commit()?;

        Ok(row)
    }

    // Primary keys matching a WHERE body, in creation order.
    fn select_pks(conn: &Connection, schema: &TableSchema, filter: &SqlFilter) -> Result<Vec<String>, Error> {
        let sql = format!(
            "SELECT {pk} FROM {table} WHERE {clause} ORDER BY {created}, rowid",
            pk = quote(schema.pk),
            table = quote(&schema.table),
            clause = filter.clause,
            created = quote(DATE_CREATED),
        );

        let mut stmt = conn.prepare(&sql)?;
        let pks = stmt
            .query_map(params_from_iter(filter.params.iter()), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pks)
    }

    fn load_many(&self, filter: &SqlFilter) -> Result<Vec<Entity>, Error> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut entities = Vec::new();
        for pk in Self::select_pks(&tx, &self.schema, filter)? {
            if let Some(row) = load_row(&tx, &self.schema, &pk, &mut Vec::new())? {
                entities.push(row.to_entity()?);
            }
        }
        tx.commit()?;

        Ok(entities)
    }
}

impl Store for SqliteStore {
    fn model(&self) -> &'static EntityModel {
        self.schema.model
    }

    fn uuid_options(&self) -> UuidOptions {
        self.keys
    }

    fn get(&self, pk: &str) -> Result<Option<Entity>, Error> {
        let mut span = Span::new(StoreOp::Get, self.entity_name());
        let entity = self.get_row(pk)?.map(|row| row.to_entity()).transpose()?;
        span.set_rows(usize::from(entity.is_some()));

        Ok(entity)
    }

    fn scan(&self) -> Result<Vec<Entity>, Error> {
        let mut span = Span::new(StoreOp::Scan, self.entity_name());
        let rows = self.load_many(&SqlFilter {
            clause: "1".to_string(),
            params: Vec::new(),
        })?;
        span.set_rows(rows.len());

        Ok(rows)
    }

    fn filter(&self, criteria: &Criteria) -> Result<Vec<Entity>, Error> {
        let mut span = Span::new(StoreOp::Filter, self.entity_name());
        let filter = query::build_filter(&self.schema, criteria)?;
        tracing::debug!(entity = self.entity_name(), sql = %filter.clause, "sqlite filter");

        let rows = self.load_many(&filter)?;
        span.set_rows(rows.len());

        Ok(rows)
    }

    fn insert(&self, mut entity: Entity) -> Result<Entity, Error> {
        check_model(self.schema.model, &entity)?;
        let mut span = Span::new(StoreOp::Insert, self.entity_name());

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if let Some(pk) = entity.pk()
            && exists(&tx, &self.schema, pk)?
        {
            return Err(already_exists(self.entity_name(), pk));
        }
        let written = write_graph(&tx, &self.schema, &mut entity, &mut Vec::new())?;
        tx.commit()?;
        span.set_rows(written);

        tracing::debug!(entity = self.entity_name(), pk = ?entity.pk(), rows = written, "sqlite insert");

        Ok(entity)
    }

    fn update(&self, mut entity: Entity) -> Result<Entity, Error> {
        check_model(self.schema.model, &entity)?;
        let mut span = Span::new(StoreOp::Update, self.entity_name());
        let pk = require_pk(&entity, "update")?.to_string();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if !exists(&tx, &self.schema, &pk)? {
            return Err(Error::not_found(self.entity_name(), &pk));
        }
        let written = write_graph(&tx, &self.schema, &mut entity, &mut Vec::new())?;
        tx.commit()?;
        span.set_rows(written);

        Ok(entity)
    }

    fn patch(&self, entity: Entity) -> Result<Entity, Error> {
        check_model(self.schema.model, &entity)?;
        let mut span = Span::new(StoreOp::Patch, self.entity_name());
        let pk = require_pk(&entity, "patch")?.to_string();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut merged = match load_row(&tx, &self.schema, &pk, &mut Vec::new())? {
            Some(row) => {
                let mut existing = row.to_entity()?;
                merge_non_null(&mut existing, &entity)?;
                existing
            }
            None => entity,
        };
        let written = write_graph(&tx, &self.schema, &mut merged, &mut Vec::new())?;
        tx.commit()?;
        span.set_rows(written);

        Ok(merged)
    }

    fn delete(&self, pk: &str) -> Result<(), Error> {
        let mut span = Span::new(StoreOp::Delete, self.entity_name());
        let pk = lookup_key(pk);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote(&self.schema.table),
                quote(self.schema.pk)
            ),
            [&pk],
        )?;
        if deleted == 0 {
            return Err(Error::not_found(self.entity_name(), &pk));
        }
        tx.commit()?;
        span.set_rows(deleted);

        Ok(())
    }
}

///
/// ROW IO
///

fn exists(conn: &Connection, schema: &TableSchema, pk: &str) -> Result<bool, Error> {
    let found = conn
        .query_row(
            &format!(
                "SELECT 1 FROM {} WHERE {} = ?1",
                quote(&schema.table),
                quote(schema.pk)
            ),
            [pk],
            |_| Ok(()),
        )
        .optional()?;

    Ok(found.is_some())
}

// Load one row and, recursively, its relationship children. `path` holds the
// keys being loaded above this one.
fn load_row(
    conn: &Connection,
    schema: &TableSchema,
    pk: &str,
    path: &mut Vec<String>,
) -> Result<Option<EntityRow>, Error> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        schema.select_list(),
        quote(&schema.table),
        quote(schema.pk)
    );
    let width = schema.columns.len() + 3;
    let raw = conn
        .query_row(&sql, [pk], |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<Result<Vec<_>, _>>()
        })
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let (date_created, date_updated) = match (&raw[1], &raw[2]) {
        (SqlValue::Integer(c), SqlValue::Integer(u)) => (from_nanos(*c)?, from_nanos(*u)?),
        _ => {
            return Err(Error::backend(format!(
                "{} '{pk}' has malformed row timestamps",
                schema.table
            )));
        }
    };

    let mut entries = vec![(Value::from(schema.pk), Value::from(pk))];
    for (column, value) in schema.columns.iter().zip(&raw[3..]) {
        entries.push((Value::from(column.name), from_sql(column, value.into())?));
    }

    if path.iter().any(|p| p == pk) {
        return Err(Error::malformed(
            ErrorOrigin::Store,
            format!("relationship cycle through {} '{pk}'", schema.table),
        ));
    }
    path.push(pk.to_string());

    for link in &schema.links {
        let child_schema = TableSchema::for_model(link.target)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT child_id FROM {} WHERE parent_id = ?1 ORDER BY position",
            quote(&link.table)
        ))?;
        let child_ids = stmt
            .query_map([pk], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut children = Vec::with_capacity(child_ids.len());
        for child_id in child_ids {
            if let Some(row) = load_row(conn, &child_schema, &child_id, path)? {
                children.push(Value::from(row.to_entity()?));
            }
        }
        entries.push((Value::from(link.field), Value::List(children)));
    }
    path.pop();

    Ok(Some(EntityRow {
        model: schema.model,
        pk: pk.to_string(),
        date_created,
        date_updated,
        values: Value::Map(entries),
    }))
}

// Upsert an entity graph, children first. Missing keys are generated and
// written back into the graph. Returns the number of rows written.
fn write_graph(
    conn: &Connection,
    schema: &TableSchema,
    entity: &mut Entity,
    path: &mut Vec<String>,
) -> Result<usize, Error> {
    if entity.pk().is_none() {
        entity.set_pk(uuid::generate().as_str())?;
    }
    let pk = require_pk(entity, "write")?.to_string();

    if path.contains(&pk) {
        return Err(Error::malformed(
            ErrorOrigin::Store,
            format!("relationship cycle through {} '{pk}'", schema.table),
        ));
    }
    path.push(pk.clone());

    // children
    let mut written = 0;
    let mut child_keys = Vec::with_capacity(schema.links.len());
    for link in &schema.links {
        let child_schema = TableSchema::for_model(link.target)?;
        let mut items = match entity.get(link.field) {
            Some(Value::List(items)) => items.clone(),
            _ => Vec::new(),
        };

        let mut keys = Vec::with_capacity(items.len());
        for item in &mut items {
            if let Value::Entity(child) = item {
                written += write_graph(conn, &child_schema, child, path)?;
                keys.extend(child.pk().map(str::to_string));
            }
        }
        entity.set(link.field, Value::List(items))?;
        child_keys.push(keys);
    }
    path.pop();

    // row
    let now = now_nanos();
    let mut names = vec![quote(schema.pk), quote(DATE_CREATED), quote(DATE_UPDATED)];
    let mut params = vec![
        SqlValue::Text(pk.clone()),
        SqlValue::Integer(now),
        SqlValue::Integer(now),
    ];
    for column in &schema.columns {
        names.push(quote(column.name));
        params.push(to_sql(
            column.storage,
            entity.get(column.name).unwrap_or(&Value::Null),
        )?);
    }
    let updates = names[2..]
        .iter()
        .map(|n| format!("{n} = excluded.{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table} ({cols}) VALUES ({marks}) ON CONFLICT({pk}) DO UPDATE SET {updates}",
        table = quote(&schema.table),
        cols = names.join(", "),
        marks = vec!["?"; names.len()].join(", "),
        pk = quote(schema.pk),
    );
    conn.execute(&sql, params_from_iter(params))?;
    written += 1;

    // links
    for (link, keys) in schema.links.iter().zip(child_keys) {
        conn.execute(
            &format!("DELETE FROM {} WHERE parent_id = ?1", quote(&link.table)),
            [&pk],
        )?;

        let insert = format!(
            "INSERT INTO {} (parent_id, child_id, position) VALUES (?1, ?2, ?3)",
            quote(&link.table)
        );
        for (position, child) in keys.iter().enumerate() {
            let position = i64::try_from(position).unwrap_or(i64::MAX);
            conn.execute(&insert, rusqlite::params![pk, child, position])?;
        }
    }

    Ok(written)
}
