//! Core runtime for entwine: schema descriptors, dynamic values, validated
//! entities, the object-graph transformer, record filtering, and the
//! filterable stores with their permission middleware.

// public exports are one module level down
pub mod access;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod filter;
pub mod model;
pub mod obs;
pub mod profile;
pub mod transform;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Domain vocabulary plus the store trait; errors, backends and
/// configuration stay behind their modules.
///

pub mod prelude {
    pub use crate::{
        db::{IntoEntity, Store},
        entity::Entity,
        entity_ref,
        filter::{Criteria, RecordFilter},
        model::{EntityModel, EntityRef, FieldDefault, FieldKind, FieldModel},
        profile::Profile,
        transform::Transformer,
        value::Value,
    };
}
