//! Table layout derived from entity models.
//!
//! One table per model: the primary-key column, `date_created` and
//! `date_updated` (unix nanoseconds), then one column per non-relationship
//! field. Each relationship field gets a link table of
//! `(parent_id, child_id, position)` cascading on parent and child delete.

use crate::{
    error::Error,
    model::{EntityModel, FieldKind},
};
use rusqlite::Connection;
use std::collections::BTreeSet;

pub(crate) const DATE_CREATED: &str = "date_created";
pub(crate) const DATE_UPDATED: &str = "date_updated";

///
/// Storage
/// SQLite representation of one field kind.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Storage {
    Bool,
    Date,
    Float,
    Int,
    Json,
    Text,
    Timestamp,
}

impl Storage {
    pub(crate) const fn for_kind(kind: &FieldKind) -> Self {
        match kind.unwrap_optional() {
            FieldKind::Bool => Self::Bool,
            FieldKind::Date => Self::Date,
            FieldKind::Float => Self::Float,
            FieldKind::Int => Self::Int,
            FieldKind::Text | FieldKind::Uuid | FieldKind::UuidStr => Self::Text,
            FieldKind::Timestamp => Self::Timestamp,
            _ => Self::Json,
        }
    }

    pub(crate) const fn sql_type(self) -> &'static str {
        match self {
            Self::Bool | Self::Int => "INTEGER",
            Self::Float => "REAL",
            Self::Date | Self::Json | Self::Text | Self::Timestamp => "TEXT",
        }
    }
}

///
/// Column
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct Column {
    pub name: &'static str,
    pub kind: &'static FieldKind,
    pub storage: Storage,
}

///
/// Link
/// Link table backing one relationship field.
///

#[derive(Clone, Debug)]
pub(crate) struct Link {
    pub field: &'static str,
    pub target: &'static EntityModel,
    pub table: String,
}

///
/// TableSchema
///

#[derive(Clone, Debug)]
pub(crate) struct TableSchema {
    pub model: &'static EntityModel,
    pub table: String,
    pub pk: &'static str,
    pub columns: Vec<Column>,
    pub links: Vec<Link>,
}

impl TableSchema {
    pub(crate) fn for_model(model: &'static EntityModel) -> Result<Self, Error> {
        let pk_index = model.pk_index().ok_or_else(|| {
            Error::config(format!(
                "{} declares no primary key field '{}'",
                model.entity_name, model.primary_key
            ))
        })?;

        let mut columns = Vec::new();
        let mut links = Vec::new();
        for (index, field) in model.fields.iter().enumerate() {
            if index == pk_index {
                continue;
            }

            if let Some(target) = field.kind.relation_target() {
                links.push(Link {
                    field: field.name,
                    target,
                    table: format!("{}__{}", model.entity_name, field.name),
                });
            } else {
                columns.push(Column {
                    name: field.name,
                    kind: &field.kind,
                    storage: Storage::for_kind(&field.kind),
                });
            }
        }

        Ok(Self {
            model,
            table: model.entity_name.to_string(),
            pk: model.primary_key,
            columns,
            links,
        })
    }

    pub(crate) fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.field == name)
    }

    /// `pk, date_created, date_updated, <columns...>`
    pub(crate) fn select_list(&self) -> String {
        let mut names = vec![quote(self.pk), quote(DATE_CREATED), quote(DATE_UPDATED)];
        names.extend(self.columns.iter().map(|c| quote(c.name)));

        names.join(", ")
    }

    fn create_statements(&self) -> Vec<String> {
        let mut defs = vec![
            format!("{} TEXT PRIMARY KEY NOT NULL", quote(self.pk)),
            format!("{} INTEGER NOT NULL", quote(DATE_CREATED)),
            format!("{} INTEGER NOT NULL", quote(DATE_UPDATED)),
        ];
        defs.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", quote(c.name), c.storage.sql_type())),
        );

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&self.table),
            defs.join(", ")
        )];

        for link in &self.links {
            let target_pk = link.target.primary_key;
            statements.push(format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 parent_id TEXT NOT NULL REFERENCES {parent}({parent_pk}) ON DELETE CASCADE, \
                 child_id TEXT NOT NULL REFERENCES {child}({child_pk}) ON DELETE CASCADE, \
                 position INTEGER NOT NULL, \
                 PRIMARY KEY (parent_id, position))",
                table = quote(&link.table),
                parent = quote(&self.table),
                parent_pk = quote(self.pk),
                child = quote(link.target.entity_name),
                child_pk = quote(target_pk),
            ));
        }

        statements
    }
}

/// Create tables for a model and, transitively, its relationship targets.
pub(crate) fn ensure_schema(conn: &Connection, model: &'static EntityModel) -> Result<(), Error> {
    let mut seen = BTreeSet::new();

    ensure_recursive(conn, model, &mut seen)
}

fn ensure_recursive(
    conn: &Connection,
    model: &'static EntityModel,
    seen: &mut BTreeSet<&'static str>,
) -> Result<(), Error> {
    if !seen.insert(model.entity_name) {
        return Ok(());
    }

    let schema = TableSchema::for_model(model)?;
    for statement in schema.create_statements() {
        conn.execute(&statement, [])?;
    }
    tracing::debug!(table = %schema.table, links = schema.links.len(), "ensured sqlite schema");

    for link in &schema.links {
        ensure_recursive(conn, link.target, seen)?;
    }

    Ok(())
}

/// Quote an identifier.
pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
