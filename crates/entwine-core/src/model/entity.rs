use crate::{
    db::{Store, registry},
    model::field::FieldModel,
};
use std::{fmt, sync::Arc};

///
/// EntityModel
/// Static schema descriptor for one entity type.
///

pub struct EntityModel {
    /// Stable external name used for store partitions, tables and diagnostics.
    pub entity_name: &'static str,
    /// Primary key field name (points at an entry in `fields`).
    pub primary_key: &'static str,
    /// Ordered field list (authoritative for construction and export).
    pub fields: &'static [FieldModel],
    /// Skip type validation on construction.
    pub skip_validation: bool,
    /// Reject entity lists not tagged as relations, and relations of non-entities.
    pub strict: bool,
}

impl EntityModel {
    #[must_use]
    pub const fn new(entity_name: &'static str, fields: &'static [FieldModel]) -> Self {
        Self {
            entity_name,
            primary_key: "id",
            fields,
            skip_validation: false,
            strict: true,
        }
    }

    #[must_use]
    pub const fn with_primary_key(mut self, primary_key: &'static str) -> Self {
        self.primary_key = primary_key;
        self
    }

    #[must_use]
    pub const fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    /// Disable the strict relationship-marker checks.
    #[must_use]
    pub const fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Index of the primary-key field, if the model declares it.
    #[must_use]
    pub fn pk_index(&self) -> Option<usize> {
        self.field_index(self.primary_key)
    }

    /// Relationship fields with their resolved target models.
    #[must_use]
    pub fn relationship_fields(&self) -> Vec<(&'static str, &'static EntityModel)> {
        self.fields
            .iter()
            .filter_map(|f| f.kind.relation_target().map(|target| (f.name, target)))
            .collect()
    }

    /// Store registered for this entity, if any.
    #[must_use]
    pub fn store(&self) -> Option<Arc<dyn Store>> {
        registry::store_for(self.entity_name)
    }

    /// Identity comparison; models are unique per entity name.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        self.entity_name == other.entity_name
    }
}

impl fmt::Debug for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("entity_name", &self.entity_name)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}
